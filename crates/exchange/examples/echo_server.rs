//! Answers every request with its method, path and body, one request per connection.
//!
//! ```text
//! curl -v -d 'hello' http://127.0.0.1:8080/echo
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use http_body_util::BodyExt;
use micro_exchange::exchange::HttpExchange;
use micro_exchange::protocol::body::body_channel;
use micro_exchange::protocol::{BoxError, CONTENT_LENGTH, PayloadItem, TransportError};
use micro_exchange::transport::{Dispatch, IoTransport, TransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::io::ReaderStream;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const MAX_HEADER_NUM: usize = 64;
const MAX_HEADER_BYTES: usize = 8 * 1024;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        tokio::spawn(async move {
            match serve(tcp_stream, remote_addr).await {
                Ok(()) => info!("finished process, connection shutdown"),
                Err(e) => error!("service has error, cause {}, connection shutdown", e),
            }
        });
    }
}

async fn serve(tcp_stream: TcpStream, remote_addr: SocketAddr) -> Result<(), BoxError> {
    let (mut reader, writer) = tcp_stream.into_split();

    let mut buffer = BytesMut::with_capacity(MAX_HEADER_BYTES);
    let head_len = loop {
        if reader.read_buf(&mut buffer).await? == 0 {
            return Ok(());
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut request = httparse::Request::new(&mut headers);
        if let httparse::Status::Complete(head_len) = request.parse(&buffer)? {
            break head_len;
        }
        if buffer.len() >= MAX_HEADER_BYTES {
            return Err("request head too large".into());
        }
    };

    let head = buffer.split_to(head_len).freeze();
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut request = httparse::Request::new(&mut headers);
    request.parse(&head)?;

    let content_length = request
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(CONTENT_LENGTH))
        .and_then(|header| std::str::from_utf8(header.value).ok()?.trim().parse::<u64>().ok())
        .unwrap_or(0);

    // body bytes that arrived together with the head go first, the rest is read on demand
    let buffered = buffer.split().freeze();
    let buffered = buffered.slice(..buffered.len().min(usize::try_from(content_length)?));
    let remaining = content_length - buffered.len() as u64;
    let payload = stream::iter((!buffered.is_empty()).then(|| Ok(PayloadItem::Chunk(buffered))))
        .chain(ReaderStream::new(reader.take(remaining)).map(|chunk| chunk.map(PayloadItem::Chunk).map_err(TransportError::from)))
        .chain(stream::iter([Ok(PayloadItem::Eof)]));

    let config = TransportConfig::new().with_dispatch(Dispatch::EventLoop);
    let (mut feed, inbound) = body_channel(payload, config.capacity());
    let transport =
        Arc::new(IoTransport::with_config(writer, config).with_remote_address(remote_addr).with_inbound(inbound));

    let mut exchange = HttpExchange::decode(Arc::clone(&transport), request)?;

    let body = exchange.inbound_subscribe()?;
    let (feed_result, received) = tokio::join!(feed.start(), body.collect());
    feed_result?;
    let received = received?.to_bytes();

    info!(
        method = %exchange.method(),
        path = exchange.uri().path(),
        remote_addr = ?exchange.remote_address(),
        body_size = received.len(),
        "receiving request"
    );

    exchange.set_response_header("Content-Type", "text/plain; charset=utf-8")?;
    exchange.set_response_header("Connection", "close")?;

    let greeting = Bytes::from(format!("{} {}\r\n", exchange.method(), exchange.uri().path()));
    exchange.outbound_write(stream::iter([Ok::<_, TransportError>(greeting), Ok(received)])).await?;

    drop(exchange);
    if let Ok(transport) = Arc::try_unwrap(transport) {
        transport.into_writer().shutdown().await?;
    }
    Ok(())
}
