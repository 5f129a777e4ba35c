use crate::bufpool::{BufferPool, BufferTier, PRIMARY_BUFFER_SIZE, SECONDARY_BUFFER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt};

/// The maximum total number of header-area bytes a single request
/// may cause to be read from the source, regardless of how many
/// times the working buffer is compacted. Bounds a client that drips
/// in one complete header line at a time forever, which would never
/// trip the per-buffer-tier exhaustion check below.
pub const MAXIMUM_HEADER_AREA_SIZE: usize = 81_920;

/// An HTTP/1.1 request line and header block, plus whatever bytes
/// the parser happened to read past the blank line terminating it.
///
/// Built by [`HeaderParser::parse`]; consumed by
/// [`crate::session::ProxySession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub proxy_authorization: Option<String>,
    pub remaining_bytes: Vec<u8>,
}

/// Why [`HeaderParser::parse`] failed.
#[derive(Debug)]
pub enum ErrorKind {
    /// The source reached end-of-stream before a full header block
    /// was read.
    NetworkClosed,
    /// The request line or a header line did not match the grammar.
    Malformed(String),
    /// The header block did not fit within the 16 KiB secondary
    /// buffer, or exceeded [`MAXIMUM_HEADER_AREA_SIZE`] in total.
    HeaderTooLarge,
    /// The underlying source returned an I/O error.
    Io(std::io::Error),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::NetworkClosed => f.write_str("connection closed before headers completed"),
            ErrorKind::Malformed(reason) => write!(f, "malformed request: {}", reason),
            ErrorKind::HeaderTooLarge => f.write_str("header block too large"),
            ErrorKind::Io(e) => write!(f, "I/O error while reading headers: {}", e),
        }
    }
}

impl std::error::Error for ErrorKind {}

/// Incrementally parses an HTTP/1.1 request line and header block
/// from an `AsyncRead` source, tolerant of the source handing back
/// partial lines across many small reads.
pub struct HeaderParser;

impl HeaderParser {
    /// Reads and parses one request's header block from `source`.
    ///
    /// On success, `source` has been read exactly up to (and
    /// including) the blank line terminating the headers; any bytes
    /// already read past that point are returned in
    /// `ParsedRequest::remaining_bytes`, never reread from `source`.
    pub async fn parse<R>(source: &mut R) -> Result<ParsedRequest, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let pool = BufferPool::global();
        let mut tier = BufferTier::Primary;
        let mut buf = pool.take(tier);
        let mut filled = 0usize;
        let mut consumed = 0usize;
        let mut total_read = 0usize;

        let mut request_line: Option<(String, String)> = None;
        let mut headers = Vec::new();
        let mut proxy_authorization = None;

        loop {
            while let Some(lf) = memchr_lf(&buf[consumed..filled]) {
                let mut line = &buf[consumed..consumed + lf];
                if line.last() == Some(&b'\r') {
                    line = &line[..line.len() - 1];
                }
                consumed += lf + 1;

                if request_line.is_none() {
                    request_line = Some(parse_request_line(line)?);
                    continue;
                }

                if line.is_empty() {
                    let (method, url) = request_line.expect("checked above");
                    let remaining_bytes = buf[consumed..filled].to_vec();
                    pool.give_back(tier, buf);
                    return Ok(ParsedRequest {
                        method,
                        url,
                        headers,
                        proxy_authorization,
                        remaining_bytes,
                    });
                }

                let (name, value) = parse_header_line(line)?;
                if name.len() >= 6 && name.as_bytes()[..6].eq_ignore_ascii_case(b"Proxy-") {
                    if name.eq_ignore_ascii_case("Proxy-Authorization") {
                        proxy_authorization = Some(value);
                    }
                    // Any other Proxy-* header is dropped: it must
                    // never reach the upstream.
                } else {
                    headers.push((name, value));
                }
            }

            // Reclaim space already consumed before deciding whether
            // we need to grow or fail.
            if consumed > 0 {
                buf.copy_within(consumed..filled, 0);
                filled -= consumed;
                consumed = 0;
            }

            if filled == buf.len() {
                match tier {
                    BufferTier::Primary => {
                        let mut secondary = pool.take(BufferTier::Secondary);
                        secondary[..filled].copy_from_slice(&buf[..filled]);
                        pool.give_back(BufferTier::Primary, buf);
                        buf = secondary;
                        tier = BufferTier::Secondary;
                    }
                    BufferTier::Secondary => {
                        pool.give_back(BufferTier::Secondary, buf);
                        return Err(ErrorKind::HeaderTooLarge);
                    }
                }
            }

            let n = source
                .read(&mut buf[filled..])
                .await
                .map_err(ErrorKind::Io)?;
            if n == 0 {
                pool.give_back(tier, buf);
                return Err(ErrorKind::NetworkClosed);
            }
            filled += n;
            total_read += n;
            if total_read > MAXIMUM_HEADER_AREA_SIZE {
                pool.give_back(tier, buf);
                return Err(ErrorKind::HeaderTooLarge);
            }
        }
    }
}

fn memchr_lf(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == b'\n')
}

fn parse_request_line(line: &[u8]) -> Result<(String, String), ErrorKind> {
    let first_space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ErrorKind::Malformed("request line missing method/URL separator".into()))?;
    let (method, rest) = (&line[..first_space], &line[first_space + 1..]);

    let second_space = rest
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ErrorKind::Malformed("request line missing URL/version separator".into()))?;
    let (url, version) = (&rest[..second_space], &rest[second_space + 1..]);

    if method.is_empty() || url.is_empty() {
        return Err(ErrorKind::Malformed("empty method or URL".into()));
    }
    if version != b"HTTP/1.1" {
        return Err(ErrorKind::Malformed(format!(
            "unsupported version {:?}",
            String::from_utf8_lossy(version)
        )));
    }

    let method = String::from_utf8(method.to_vec())
        .map_err(|_| ErrorKind::Malformed("method is not ASCII".into()))?;
    let url = String::from_utf8(url.to_vec())
        .map_err(|_| ErrorKind::Malformed("URL is not ASCII".into()))?;

    Ok((method, url))
}

fn parse_header_line(line: &[u8]) -> Result<(String, String), ErrorKind> {
    if line.contains(&b'\r') {
        return Err(ErrorKind::Malformed("header name contains CR".into()));
    }

    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| ErrorKind::Malformed("header line missing ':'".into()))?;

    let name = std::str::from_utf8(&line[..colon])
        .map_err(|_| ErrorKind::Malformed("header name is not ASCII".into()))?
        .trim();
    let value = std::str::from_utf8(&line[colon + 1..])
        .map_err(|_| ErrorKind::Malformed("header value is not ASCII".into()))?
        .trim();

    if name.is_empty() {
        return Err(ErrorKind::Malformed("empty header name".into()));
    }

    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse_bytes(input: &[u8]) -> Result<ParsedRequest, ErrorKind> {
        let mut cursor = std::io::Cursor::new(input.to_vec());
        HeaderParser::parse(&mut cursor).await
    }

    #[tokio::test]
    async fn parses_connect_request_lf_only() {
        let req = parse_bytes(b"CONNECT example.com:443 HTTP/1.1\nHost: example.com:443\n\nHELLO")
            .await
            .unwrap();
        assert_eq!(req.method, "CONNECT");
        assert_eq!(req.url, "example.com:443");
        assert_eq!(req.headers, vec![("Host".to_string(), "example.com:443".to_string())]);
        assert_eq!(req.remaining_bytes, b"HELLO");
    }

    #[tokio::test]
    async fn parses_with_crlf_line_endings() {
        let req = parse_bytes(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.headers, vec![("Host".to_string(), "x".to_string())]);
    }

    #[tokio::test]
    async fn strips_proxy_headers_and_captures_authorization() {
        let req = parse_bytes(
            b"GET http://example.com/ HTTP/1.1\nProxy-Connection: keep-alive\nProxy-Authorization: Basic dXNlcg==\nHost: example.com\n\n",
        )
        .await
        .unwrap();
        assert_eq!(req.headers, vec![("Host".to_string(), "example.com".to_string())]);
        assert_eq!(req.proxy_authorization.as_deref(), Some("Basic dXNlcg=="));
    }

    #[tokio::test]
    async fn rejects_bad_version() {
        let err = parse_bytes(b"GET / HTTP/1.0\n\n").await.unwrap_err();
        assert!(matches!(err, ErrorKind::Malformed(_)));
    }

    #[tokio::test]
    async fn rejects_eof_mid_header() {
        let err = parse_bytes(b"GET / HTTP/1.1\nHost: x").await.unwrap_err();
        assert!(matches!(err, ErrorKind::NetworkClosed));
    }

    #[tokio::test]
    async fn succeeds_with_header_block_exactly_primary_buffer() {
        let mut input = b"GET / HTTP/1.1\n".to_vec();
        // Pad with a single large header so the blank line lands
        // exactly at the end of the 4096-byte primary buffer.
        let prefix_len = input.len();
        let terminator_len = "\n\n".len();
        let header_name = "X-Pad: ";
        let pad_len = PRIMARY_BUFFER_SIZE - prefix_len - header_name.len() - terminator_len;
        input.extend_from_slice(header_name.as_bytes());
        input.extend(std::iter::repeat(b'a').take(pad_len));
        input.extend_from_slice(b"\n\n");
        assert_eq!(input.len(), PRIMARY_BUFFER_SIZE);

        let req = parse_bytes(&input).await.unwrap();
        assert_eq!(req.headers[0].0, "X-Pad");
        assert_eq!(req.headers[0].1.len(), pad_len);
    }

    #[tokio::test]
    async fn succeeds_using_secondary_buffer() {
        let mut input = b"GET / HTTP/1.1\n".to_vec();
        input.extend_from_slice(b"X-Pad: ");
        input.extend(std::iter::repeat(b'a').take(8000));
        input.extend_from_slice(b"\n\n");
        assert!(input.len() > PRIMARY_BUFFER_SIZE);
        assert!(input.len() < SECONDARY_BUFFER_SIZE);

        let req = parse_bytes(&input).await.unwrap();
        assert_eq!(req.headers[0].1.len(), 8000);
    }

    #[tokio::test]
    async fn fails_when_header_block_exceeds_maximum_area() {
        let mut input = b"GET / HTTP/1.1\n".to_vec();
        input.extend_from_slice(b"X-Pad: ");
        input.extend(std::iter::repeat(b'a').take(90_000));
        // Deliberately never terminate the header block.

        let err = parse_bytes(&input).await.unwrap_err();
        assert!(matches!(err, ErrorKind::HeaderTooLarge));
    }

    struct Chunked<'a> {
        chunks: std::collections::VecDeque<&'a [u8]>,
    }

    impl<'a> AsyncRead for Chunked<'a> {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if let Some(chunk) = self.chunks.pop_front() {
                buf.put_slice(chunk);
            }
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn tolerates_header_split_across_many_small_reads() {
        let whole = b"CONNECT example.com:443 HTTP/1.1\nHost: example.com\n\nBODY".to_vec();
        let mut chunks = std::collections::VecDeque::new();
        for byte in whole.chunks(1) {
            chunks.push_back(byte);
        }
        let mut source = Chunked { chunks };
        let req = HeaderParser::parse(&mut source).await.unwrap();
        assert_eq!(req.method, "CONNECT");
        assert_eq!(req.remaining_bytes, b"BODY");
    }
}
