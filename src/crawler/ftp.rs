//! Anonymous FTP retrieval
//!
//! suppaftp is blocking, so each transfer runs on the blocking pool under a
//! tokio timeout. Files are fetched with RETR in binary mode; directory URLs
//! (ending in `/`) are listed with NLST and answered as one absolute URL per
//! line so the raw-text link scan picks the entries up.

use crate::crawler::FetchResult;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use url::Url;

const DEFAULT_PORT: u16 = 21;
const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

/// Fetches an `ftp://` URL within `timeout`
pub async fn fetch_ftp(url: &Url, timeout: Duration) -> FetchResult {
    let Some(host) = url.host_str().map(str::to_string) else {
        return FetchResult::InvalidUrl {
            error: "missing host".to_string(),
        };
    };
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let target = url.clone();

    let transfer = tokio::task::spawn_blocking(move || transfer(&host, port, &target));
    match tokio::time::timeout(timeout, transfer).await {
        Ok(Ok(Ok(body))) => FetchResult::Success {
            final_url: url.to_string(),
            status: 226,
            content_type: is_directory(url).then(|| "text/plain".to_string()),
            last_modified: None,
            body,
        },
        Ok(Ok(Err(e))) => classify_error(e),
        Ok(Err(e)) => FetchResult::ConnectionFailure {
            error: e.to_string(),
        },
        Err(_) => FetchResult::Timeout {
            error: format!("no answer from {} within {:?}", url, timeout),
        },
    }
}

fn is_directory(url: &Url) -> bool {
    url.path().is_empty() || url.path().ends_with('/')
}

fn transfer(host: &str, port: u16, url: &Url) -> Result<Vec<u8>, FtpError> {
    let mut ftp = FtpStream::connect((host, port))?;
    ftp.login(ANONYMOUS_USER, ANONYMOUS_PASSWORD)?;
    ftp.transfer_type(FileType::Binary)?;

    let body = if is_directory(url) {
        let names = ftp.nlst(Some(url.path()))?;
        listing_body(url, &names)
    } else {
        ftp.retr_as_buffer(url.path())?.into_inner()
    };

    if let Err(e) = ftp.quit() {
        tracing::debug!("QUIT to {} failed: {}", host, e);
    }
    Ok(body)
}

/// One absolute URL per listed name
fn listing_body(directory: &Url, names: &[String]) -> Vec<u8> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .filter_map(|name| {
            let name = name.rsplit('/').next().unwrap_or(name);
            directory.join(name).ok()
        })
        .map(|entry| format!("{}\n", entry))
        .collect::<String>()
        .into_bytes()
}

/// Permanent (5xx) replies reject; anything else is a connection problem
fn classify_error(e: FtpError) -> FetchResult {
    match e {
        FtpError::UnexpectedResponse(response) if response.status.code() >= 500 => {
            FetchResult::ClientError {
                status: response.status.code() as u16,
            }
        }
        other => FetchResult::ConnectionFailure {
            error: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Serves one anonymous session; RETR of `file` answers `content`
    async fn serve_session(listener: TcpListener, file: &'static str, content: &'static [u8]) {
        let (control, _) = listener.accept().await.unwrap();
        let (read, mut write) = control.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"220 ready\r\n").await.unwrap();

        let mut data: Option<TcpListener> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            let (command, argument) = line.split_once(' ').unwrap_or((line.as_str(), ""));
            match command.to_ascii_uppercase().as_str() {
                "USER" => write.write_all(b"331 password please\r\n").await.unwrap(),
                "PASS" => write.write_all(b"230 logged in\r\n").await.unwrap(),
                "TYPE" => write.write_all(b"200 type set\r\n").await.unwrap(),
                "PASV" => {
                    let passive = TcpListener::bind("127.0.0.1:0").await.unwrap();
                    let port = passive.local_addr().unwrap().port();
                    let reply = format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                        port / 256,
                        port % 256
                    );
                    data = Some(passive);
                    write.write_all(reply.as_bytes()).await.unwrap();
                }
                "RETR" if argument == file => {
                    let passive = data.take().unwrap();
                    write.write_all(b"150 opening\r\n").await.unwrap();
                    let (mut stream, _) = passive.accept().await.unwrap();
                    stream.write_all(content).await.unwrap();
                    stream.shutdown().await.unwrap();
                    drop(stream);
                    write.write_all(b"226 done\r\n").await.unwrap();
                }
                "RETR" => write.write_all(b"550 no such file\r\n").await.unwrap(),
                "QUIT" => {
                    write.write_all(b"221 bye\r\n").await.unwrap();
                    break;
                }
                _ => write.write_all(b"502 not implemented\r\n").await.unwrap(),
            }
        }
    }

    #[tokio::test]
    async fn test_retrieves_file_anonymously() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_session(listener, "/pub/riscos/edit.zip", b"PK\x03\x04zip"));

        let url = Url::parse(&format!("ftp://127.0.0.1:{}/pub/riscos/edit.zip", port)).unwrap();
        match fetch_ftp(&url, Duration::from_secs(5)).await {
            FetchResult::Success {
                final_url,
                content_type,
                body,
                ..
            } => {
                assert_eq!(final_url, url.to_string());
                assert_eq!(content_type, None);
                assert_eq!(body, b"PK\x03\x04zip".to_vec());
            }
            other => panic!("unexpected result {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_a_client_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_session(listener, "/pub/other.zip", b""));

        let url = Url::parse(&format!("ftp://127.0.0.1:{}/pub/gone.zip", port)).unwrap();
        assert!(matches!(
            fetch_ftp(&url, Duration::from_secs(5)).await,
            FetchResult::ClientError { status: 550 }
        ));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ftp://127.0.0.1:{}/pub/a.zip", port)).unwrap();
        assert!(matches!(
            fetch_ftp(&url, Duration::from_secs(5)).await,
            FetchResult::ConnectionFailure { .. }
        ));
    }

    #[test]
    fn test_listing_lines_are_absolute() {
        let directory = Url::parse("ftp://ftp.a.org/pub/riscos/").unwrap();
        let names = vec![
            "edit.zip".to_string(),
            "/pub/riscos/draw.zip".to_string(),
            ".".to_string(),
        ];
        assert_eq!(
            String::from_utf8(listing_body(&directory, &names)).unwrap(),
            "ftp://ftp.a.org/pub/riscos/edit.zip\nftp://ftp.a.org/pub/riscos/draw.zip\n"
        );
    }
}
