//! The immutable request side of an exchange.
//!
//! A [`RequestContext`] is built exactly once from the head the transport
//! decoder has already parsed: method, URI, version and raw header pairs.
//! Nothing in it changes for the rest of the exchange.

use http::{Method, Uri};

use crate::protocol::{HeaderCollection, Protocol, ProtocolError};

/// Represents the decoded request head of an exchange.
#[derive(Debug, Clone)]
pub struct RequestContext {
    protocol: Protocol,
    method: Method,
    uri: Uri,
    headers: HeaderCollection,
}

impl RequestContext {
    pub fn new(protocol: Protocol, method: Method, uri: Uri, headers: HeaderCollection) -> Self {
        Self { protocol, method, uri, headers }
    }

    /// Builds a request context from the decoder's string tokens.
    ///
    /// `version` is the minor number of `HTTP/1.x`, the way `httparse` reports it.
    pub fn from_parts<'a, I>(method: &str, uri: &str, version: u8, headers: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let protocol = Protocol::try_from(version)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ProtocolError::InvalidMethod)?;
        let uri = uri.parse::<Uri>().map_err(|_| ProtocolError::InvalidUri)?;

        let mut collection = HeaderCollection::new();
        for (name, value) in headers {
            let value = std::str::from_utf8(value)
                .map_err(|_| ProtocolError::invalid_header(format!("value of {name} is not valid utf-8")))?;
            collection.add(name, value.trim());
        }

        Ok(Self { protocol, method, uri, headers: collection })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    /// Determines if this request may carry a body based on its method.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }
}

/// Converts a request head parsed by `httparse`.
impl<'headers, 'buf> TryFrom<httparse::Request<'headers, 'buf>> for RequestContext {
    type Error = ProtocolError;

    fn try_from(req: httparse::Request<'headers, 'buf>) -> Result<Self, Self::Error> {
        let method = req.method.ok_or(ProtocolError::IncompleteHead { missing: "method" })?;
        let path = req.path.ok_or(ProtocolError::IncompleteHead { missing: "path" })?;
        let version = req.version.ok_or(ProtocolError::IncompleteHead { missing: "version" })?;

        RequestContext::from_parts(method, path, version, req.headers.iter().map(|header| (header.name, header.value)))
    }
}
