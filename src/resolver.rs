use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::*;

/// Resolver turns a hostname into the candidate addresses a browser request
/// is sent to. Implementations must return the records of both address
/// families, in the order the underlying lookup produced them.
#[async_trait]
pub trait Resolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// DnsResolver uses the system resolver through tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addresses: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();

        if addresses.is_empty() {
            return Err(Error::ErrNoAddresses);
        }

        log::trace!("resolved {} to {:?}", host, addresses);
        Ok(addresses)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_resolve_ip_literal() -> Result<()> {
        let addresses = DnsResolver.resolve("127.0.0.1").await?;
        assert_eq!(addresses, vec!["127.0.0.1".parse::<IpAddr>()?]);

        Ok(())
    }
}
