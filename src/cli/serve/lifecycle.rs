//! Server lifecycle management.

use crate::log;
use anyhow::{Result, anyhow};
use std::net::{IpAddr, SocketAddr};
use tiny_http::Server;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, trying the next ports when
/// the requested one is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                // Port 0 asks the OS; report what it picked.
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind {} after {} attempts from port {}: {}",
        interface,
        MAX_PORT_RETRIES,
        base_port,
        last_error.map_or_else(|| "port range exhausted".to_string(), |e| e.to_string())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_retries_next_port() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (first, first_addr) = bind_with_retry(localhost, 0).unwrap();
        let taken = first_addr.port();

        let (_second, second_addr) = bind_with_retry(localhost, taken).unwrap();
        assert_ne!(second_addr.port(), taken);
        drop(first);
    }
}
