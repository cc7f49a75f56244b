//! UDP sender for the chatbox, typing and jump addresses

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;

use super::{StatusSink, ADDR_CHATBOX_INPUT, ADDR_CHATBOX_TYPING, ADDR_INPUT_JUMP};
use crate::error::SendError;

/// Gap between the press and release of a jump.
pub const JUMP_RELEASE_DELAY: Duration = Duration::from_millis(80);

/// Fire-and-forget OSC client. Cheap to clone; clones share the socket.
#[derive(Debug, Clone)]
pub struct OscDispatcher {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl OscDispatcher {
    /// Bind an ephemeral local socket and resolve `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr_str = format!("{}:{}", host, port);
        let target = tokio::net::lookup_host(&addr_str)
            .await
            .with_context(|| format!("Failed to resolve OSC target {}", addr_str))?
            .next()
            .with_context(|| format!("No address for OSC target {}", addr_str))?;

        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind)
            .await
            .context("Failed to bind OSC socket")?;

        Ok(Self {
            socket: Arc::new(socket),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    async fn send(&self, addr: &str, args: Vec<OscType>) -> Result<(), SendError> {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let bytes = encoder::encode(&packet).map_err(|e| SendError::Encode {
            addr: addr.to_string(),
            reason: format!("{:?}", e),
        })?;
        self.socket.send_to(&bytes, self.target).await?;
        tracing::debug!("OSC {} ({} bytes) -> {}", addr, bytes.len(), self.target);
        Ok(())
    }

    async fn send_jump_state(&self, pressed: bool) -> Result<(), SendError> {
        self.send(ADDR_INPUT_JUMP, vec![OscType::Int(i32::from(pressed))])
            .await
    }
}

impl StatusSink for OscDispatcher {
    async fn send_chatbox(&self, text: &str, sound: bool) -> Result<(), SendError> {
        let full = vec![
            OscType::String(text.to_string()),
            OscType::Bool(true),
            OscType::Bool(sound),
        ];
        match self.send(ADDR_CHATBOX_INPUT, full).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!("Chatbox send with sound flag failed ({}), retrying without", e);
                let short = vec![OscType::String(text.to_string()), OscType::Bool(true)];
                self.send(ADDR_CHATBOX_INPUT, short).await
            }
        }
    }

    async fn send_typing(&self, on: bool) -> Result<(), SendError> {
        self.send(ADDR_CHATBOX_TYPING, vec![OscType::Bool(on)]).await
    }

    async fn send_jump(&self) -> Result<(), SendError> {
        self.send_jump_state(true).await?;
        tokio::time::sleep(JUMP_RELEASE_DELAY).await;
        self.send_jump_state(false).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rosc::decoder::decode_udp;

    /// A local UDP socket standing in for the remote app.
    pub(crate) async fn listener() -> (UdpSocket, u16) {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = sock.local_addr().unwrap().port();
        (sock, port)
    }

    pub(crate) async fn recv(sock: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1536];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), sock.recv_from(&mut buf))
            .await
            .expect("no datagram")
            .unwrap();
        match decode_udp(&buf[..n]).unwrap().1 {
            OscPacket::Message(msg) => msg,
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chatbox_carries_text_commit_and_sound() {
        let (sock, port) = listener().await;
        let osc = OscDispatcher::connect("127.0.0.1", port).await.unwrap();

        osc.send_chatbox("Spotify: Halo", false).await.unwrap();
        let msg = recv(&sock).await;
        assert_eq!(msg.addr, "/chatbox/input");
        assert_eq!(
            msg.args,
            vec![
                OscType::String("Spotify: Halo".into()),
                OscType::Bool(true),
                OscType::Bool(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_typing_and_jump() {
        let (sock, port) = listener().await;
        let osc = OscDispatcher::connect("127.0.0.1", port).await.unwrap();

        osc.send_typing(true).await.unwrap();
        let msg = recv(&sock).await;
        assert_eq!(msg.addr, "/chatbox/typing");
        assert_eq!(msg.args, vec![OscType::Bool(true)]);

        osc.send_jump().await.unwrap();
        let press = recv(&sock).await;
        let release = recv(&sock).await;
        assert_eq!(press.addr, "/input/Jump");
        assert_eq!(press.args, vec![OscType::Int(1)]);
        assert_eq!(release.args, vec![OscType::Int(0)]);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_an_error() {
        assert!(OscDispatcher::connect("host.invalid", 9000).await.is_err());
    }
}
