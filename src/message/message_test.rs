use super::*;

const SQLEXPRESS: &str =
    "ServerName;WINDOWS2;InstanceName;SQLEXPRESS;IsClustered;No;Version;10.50.2500.0;tcp;1433;;";
const OTHER: &str =
    "ServerName;WINDOWS2;InstanceName;XXXXXXXXXX;IsClustered;No;Version;10.50.2500.0;tcp;0;;";
const ANOTHER: &str =
    "ServerName;WINDOWS2;InstanceName;YYYYYYYYYY;IsClustered;No;Version;10.50.2500.0;tcp;0;;";

#[test]
fn test_one_instance_found() {
    assert_eq!(parse_browser_response(SQLEXPRESS, "sqlexpress"), Some(1433));
}

#[test]
fn test_two_instances_found_in_first() {
    let response = format!("{SQLEXPRESS}{OTHER}");
    assert_eq!(parse_browser_response(&response, "sqlexpress"), Some(1433));
}

#[test]
fn test_two_instances_found_in_second() {
    let response = format!("{OTHER}{SQLEXPRESS}");
    assert_eq!(parse_browser_response(&response, "sqlexpress"), Some(1433));
}

#[test]
fn test_two_instances_not_found() {
    let response = format!("{OTHER}{ANOTHER}");
    assert_eq!(parse_browser_response(&response, "sqlexpress"), None);
}

#[test]
fn test_empty_response() {
    assert_eq!(parse_browser_response("", "sqlexpress"), None);
}

#[test]
fn test_port_with_trailing_garbage() {
    let response = "ServerName;S;InstanceName;A;IsClustered;No;Version;1;tcp;1500x;;";
    assert_eq!(parse_browser_response(response, "a"), Some(1500));

    let response = "ServerName;S;InstanceName;A;IsClustered;No;Version;1;tcp;;;";
    assert_eq!(parse_browser_response(response, "a"), None);
}

#[test]
fn test_response_text_strips_header() {
    let mut reply = vec![SVR_RESP, SQLEXPRESS.len() as u8, 0];
    reply.extend_from_slice(SQLEXPRESS.as_bytes());
    assert_eq!(response_text(&reply), SQLEXPRESS);

    assert_eq!(response_text(&[SVR_RESP, 0]), "");
    assert_eq!(response_text(&[SVR_RESP, 1, 0, b'a' | 0x80]), "a");
}

#[test]
fn test_marshal_requests() -> Result<()> {
    assert_eq!(&BrowserRequest::UnicastEx.marshal()?[..], &[CLNT_UCAST_EX]);
    assert_eq!(
        &BrowserRequest::UnicastInstance("SQLEXPRESS".to_owned()).marshal()?[..],
        b"\x04SQLEXPRESS"
    );

    let too_long = BrowserRequest::UnicastInstance("X".repeat(33));
    assert_eq!(too_long.marshal(), Err(Error::ErrInstanceNameTooLong));

    Ok(())
}
