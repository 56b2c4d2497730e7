use std::time::Duration;

/// UDP port the SQL Server Browser service listens on.
pub const DEFAULT_BROWSER_PORT: u16 = 1434;

/// How long a single attempt waits for a reply before it is cancelled.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Attempts made after the first one times out.
pub const DEFAULT_RETRIES: u32 = 3;

/// LookupConfig is used to configure an instance lookup.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    // server is the host running the browser service, either an IP literal
    // or a hostname that may resolve to several addresses
    pub server: String,

    // instance_name is the named instance whose TCP port is wanted; matched
    // case-insensitively against the reply
    pub instance_name: String,

    // port of the browser service on server
    pub port: u16,

    // timeout bounds each attempt, not the lookup as a whole
    pub timeout: Duration,

    // retries is the number of further attempts after a timed out one
    pub retries: u32,

    // multi_subnet_failover races every resolved address instead of trying
    // them in resolver order
    pub multi_subnet_failover: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            server: String::new(),
            instance_name: String::new(),
            port: DEFAULT_BROWSER_PORT,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            multi_subnet_failover: false,
        }
    }
}
