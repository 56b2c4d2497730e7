use std::time::Duration;

use clap::{Arg, Command};
use mssql_browser::config::*;
use mssql_browser::{instance_lookup, Error};

// RUST_LOG=trace cargo run --color=always --example browser_query -- --server sqlhost --instance SQLEXPRESS

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let mut app = Command::new("SQL Server Browser query")
        .version("0.1.0")
        .author("Rain Liu <yliu@webrtc.rs>")
        .about("Looks up the TCP port of a named SQL Server instance")
        .arg(
            Arg::new("FULLHELP")
                .help("Prints more detailed help information")
                .long("fullhelp"),
        )
        .arg(
            Arg::new("server")
                .required_unless_present("FULLHELP")
                .takes_value(true)
                .long("server")
                .help("Host running the SQL Server Browser service"),
        )
        .arg(
            Arg::new("instance")
                .required_unless_present("FULLHELP")
                .takes_value(true)
                .long("instance")
                .help("Name of the instance to look up"),
        )
        .arg(
            Arg::new("port")
                .takes_value(true)
                .default_value("1434")
                .long("port")
                .help("UDP port of the browser service"),
        )
        .arg(
            Arg::new("timeout")
                .takes_value(true)
                .default_value("2000")
                .long("timeout")
                .help("Milliseconds to wait for each attempt"),
        )
        .arg(
            Arg::new("retries")
                .takes_value(true)
                .default_value("3")
                .long("retries")
                .help("Attempts made after a timed out one"),
        )
        .arg(
            Arg::new("multi-subnet-failover")
                .long("multi-subnet-failover")
                .help("Query every resolved address at once"),
        );

    let matches = app.clone().get_matches();

    if matches.is_present("FULLHELP") {
        app.print_long_help().unwrap();
        std::process::exit(0);
    }

    let server = matches.value_of("server").unwrap();
    let instance = matches.value_of("instance").unwrap();
    let port = parse_arg::<u16>(matches.value_of("port"), "port")?;
    let timeout = parse_arg::<u64>(matches.value_of("timeout"), "timeout")?;
    let retries = parse_arg::<u32>(matches.value_of("retries"), "retries")?;

    let config = LookupConfig {
        server: server.to_owned(),
        instance_name: instance.to_owned(),
        port,
        timeout: Duration::from_millis(timeout),
        retries,
        multi_subnet_failover: matches.is_present("multi-subnet-failover"),
    };

    let tcp_port = instance_lookup(config).await?;
    println!("{server}\\{instance} listens on tcp port {tcp_port}");

    Ok(())
}

fn parse_arg<T: std::str::FromStr>(value: Option<&str>, name: &str) -> Result<T, Error> {
    value
        .unwrap_or_default()
        .parse()
        .map_err(|_| Error::ErrInvalidArgument(format!("\"{name}\" must be a number")))
}
