use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::{DHCP_SERVER_PORT, MessageHandler};
use crate::lease::LeaseTable;

const RECV_BUFFER_SIZE: usize = 1500;

/// The UDP front end: owns the socket and the lease table and feeds each
/// datagram through a [`MessageHandler`], one at a time.
pub struct DhcpServer {
    handler: MessageHandler,
    leases: LeaseTable,
    socket: UdpSocket,
}

impl DhcpServer {
    /// Loads the lease file and binds to `0.0.0.0:67`.
    pub async fn new(config: Config) -> Result<Self> {
        Self::bind(
            config,
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DHCP_SERVER_PORT),
        )
        .await
    }

    pub async fn bind(config: Config, bind_addr: SocketAddrV4) -> Result<Self> {
        let leases = LeaseTable::load_file(&config.leases_file).await?;
        let socket = Self::create_socket(bind_addr)?;

        info!("DHCP server starting on {} ({})", bind_addr, config.server_ip);
        info!(
            "IP pool: {} - {} ({} addresses)",
            config.pool_start,
            config.pool_end,
            config.pool_size()
        );

        Ok(Self {
            handler: MessageHandler::new(config),
            leases,
            socket,
        })
    }

    fn create_socket(bind_addr: SocketAddrV4) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

        socket
            .set_reuse_address(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

        socket
            .set_broadcast(true)
            .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

        socket
            .set_nonblocking(true)
            .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

        socket.bind(&bind_addr.into()).map_err(|error| {
            Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error))
        })?;

        let std_socket: std::net::UdpSocket = socket.into();
        let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
            Error::Socket(format!("Failed to convert to tokio socket: {}", error))
        })?;

        Ok(tokio_socket)
    }

    /// Serves requests until `shutdown` is set.
    ///
    /// The flag is checked once per receive timeout, so shutdown takes
    /// effect within one timeout interval. Per-packet failures are logged
    /// and never end the loop.
    pub async fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let receive_timeout = self.handler.config().receive_timeout();

        info!("DHCP server ready and listening");

        while !shutdown.load(Ordering::Relaxed) {
            let received =
                tokio::time::timeout(receive_timeout, self.socket.recv_from(&mut buffer)).await;

            match received {
                Ok(Ok((size, source))) => {
                    debug!("Received {} bytes from {}", size, source);
                    self.process(&buffer[..size], source).await;
                }
                Ok(Err(error)) => {
                    error!("Error receiving packet: {}", error);
                }
                Err(_) => {}
            }
        }

        info!("Shutdown requested, receive loop stopped");

        Ok(())
    }

    async fn process(&mut self, datagram: &[u8], source: SocketAddr) {
        let reply = match self.handler.handle(&mut self.leases, datagram, Utc::now()) {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(error) => {
                warn!("Error handling packet from {}: {}", source, error);
                return;
            }
        };

        let destination = reply.destination.socket_addr();
        if let Err(error) = self.socket.send_to(&reply.packet.encode(), destination).await {
            warn!("Failed to send reply to {}: {}", destination, error);
        }
    }

    pub async fn save_leases(&self) -> Result<()> {
        self.leases
            .save_file(&self.handler.config().leases_file)
            .await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &Config {
        self.handler.config()
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }
}
