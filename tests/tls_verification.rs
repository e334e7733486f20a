use std::sync::Arc;

use anyhow::Result;
use destruct::error::{RetrieveError, VaultError};
use destruct::exchange::Strategy;
use destruct::vault::{ConnectOptions, VaultClient};
use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::TlsAcceptor;

const UNWRAP_BODY: &str = r#"{"data":{"destruct":"over tls"}}"#;

/// Serve `body` for every request over HTTPS with a freshly generated
/// self-signed certificate. Returns the base address.
async fn serve_self_signed(body: &'static str) -> Result<String> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_no_client_auth()
    .with_single_cert(vec![cert.der().clone()], key)?;
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = format!("https://127.0.0.1:{}", listener.local_addr()?.port());

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // The handshake fails when the client rejects the certificate.
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                if read_request(&mut tls).await.is_none() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    Ok(address)
}

/// Read one HTTP/1.1 request, headers and body.
async fn read_request<S: AsyncReadExt + Unpin>(stream: &mut S) -> Option<Vec<u8>> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + body_len {
                return Some(request);
            }
        }
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
}

fn client(address: &str, insecure: bool) -> Result<VaultClient> {
    Ok(VaultClient::connect(&ConnectOptions {
        address: address.to_string(),
        insecure,
        ..ConnectOptions::default()
    })?)
}

#[tokio::test]
async fn insecure_client_accepts_self_signed_certificate() -> Result<()> {
    let address = serve_self_signed(UNWRAP_BODY).await?;

    let payload = Strategy::Wrap
        .exchange()
        .retrieve(&client(&address, true)?, &SecretString::from("s.wrapped"))
        .await?;
    assert_eq!(payload.secret(), Some("over tls"));
    Ok(())
}

#[tokio::test]
async fn verifying_client_rejects_self_signed_certificate() -> Result<()> {
    let address = serve_self_signed(UNWRAP_BODY).await?;
    let client = client(&address, false)?;

    let err = client.read("cubbyhole/destruct").await.unwrap_err();
    assert!(matches!(err, VaultError::Transport(_)), "{err:?}");

    let err = Strategy::Wrap
        .exchange()
        .retrieve(&client, &SecretString::from("s.wrapped"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrieveError::Transport(_)), "{err:?}");
    Ok(())
}
