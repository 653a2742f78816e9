/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::BTreeMap;
use std::net::IpAddr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{self, Error};

/// Query parameters of a request. A `None` (or empty) value renders as a bare key, e.g. `?uploads`.
pub type Params = BTreeMap<String, Option<String>>;

// everything but unreserved characters is escaped, space becomes %20
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a query component or object key
pub(crate) fn query_escape(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

/// Reverse of [`query_escape`], also accepting `+` for space
pub(crate) fn query_unescape(s: &str) -> Result<String, Error> {
    let plus_as_space = s.replace('+', " ");
    percent_decode_str(&plus_as_space)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(error::invalid_input)
}

/// Serialize `params` into a sorted, escaped query string
pub(crate) fn encode_params(params: &Params) -> String {
    let mut out = String::new();
    for (k, v) in params {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&query_escape(k));
        if let Some(v) = v.as_deref().filter(|v| !v.is_empty()) {
            out.push('=');
            out.push_str(&query_escape(v));
        }
    }
    out
}

/// How bucket names map onto the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingType {
    /// Custom domain bound to a single bucket, the bucket is implied by the host
    Cname,
    /// IP literal endpoint, the bucket is the first path segment
    Ip,
    /// `bucket.endpoint` host names
    VirtualHosted,
}

/// Builds request URLs from `(bucket, object, query)`
#[derive(Debug, Clone)]
pub struct UrlMaker {
    scheme: &'static str,
    net_loc: String,
    addressing: AddressingType,
    path_style: bool,
    is_proxy: bool,
}

impl UrlMaker {
    /// Parse `[http(s)://]host[:port]`. The scheme defaults to `http`.
    pub fn new(endpoint: &str, is_cname: bool, is_path_style: bool, is_proxy: bool) -> Result<Self, Error> {
        let (scheme, rest) = if let Some(rest) = endpoint.strip_prefix("https://") {
            ("https", rest)
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            ("http", rest)
        } else {
            ("http", endpoint)
        };

        // anything after the authority is ignored
        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let authority: http::uri::Authority = authority
            .parse()
            .map_err(|e| error::invalid_input(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if authority.host().is_empty() {
            return Err(error::invalid_input(format!(
                "invalid endpoint {endpoint:?}: missing host"
            )));
        }

        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        let addressing = if host.parse::<IpAddr>().is_ok() {
            AddressingType::Ip
        } else if is_cname {
            AddressingType::Cname
        } else {
            AddressingType::VirtualHosted
        };

        Ok(Self {
            scheme,
            net_loc: authority.as_str().to_owned(),
            addressing,
            path_style: is_path_style,
            is_proxy,
        })
    }

    /// The addressing type derived from the endpoint
    pub fn addressing(&self) -> AddressingType {
        self.addressing
    }

    /// `http` or `https`
    pub fn scheme(&self) -> &str {
        self.scheme
    }

    /// Host and optional port of the endpoint
    pub fn net_loc(&self) -> &str {
        &self.net_loc
    }

    /// Whether requests are routed through a proxy
    pub fn is_proxy(&self) -> bool {
        self.is_proxy
    }

    /// Host and path for `(bucket, object)`
    pub fn build(&self, bucket: &str, object: &str) -> (String, String) {
        let object = query_escape(object);
        let addressing = match self.addressing {
            AddressingType::VirtualHosted if self.path_style => AddressingType::Ip,
            other => other,
        };

        match addressing {
            AddressingType::Cname => (self.net_loc.clone(), format!("/{object}")),
            _ if bucket.is_empty() => (self.net_loc.clone(), "/".to_owned()),
            AddressingType::Ip => (self.net_loc.clone(), format!("/{bucket}/{object}")),
            AddressingType::VirtualHosted => {
                (format!("{bucket}.{}", self.net_loc), format!("/{object}"))
            }
        }
    }

    /// Request URL, `query` is an already encoded query string
    pub fn url(&self, bucket: &str, object: &str, query: &str) -> String {
        let (host, path) = self.build(bucket, object);
        if query.is_empty() {
            format!("{}://{host}{path}", self.scheme)
        } else {
            format!("{}://{host}{path}?{query}", self.scheme)
        }
    }

    /// Pre-signed URL, the query always carries the signature
    pub fn sign_url(&self, bucket: &str, object: &str, query: &str) -> String {
        let (host, path) = self.build(bucket, object);
        format!("{}://{host}{path}?{query}", self.scheme)
    }

    /// Live channel push URL
    pub fn rtmp_url(&self, bucket: &str, channel: &str, query: &str) -> String {
        let (host, path) = self.build(bucket, "live");
        format!("rtmp://{host}{path}/{}?{query}", query_escape(channel))
    }
}

#[cfg(test)]
mod test {
    use super::{encode_params, query_escape, query_unescape, AddressingType, Params, UrlMaker};
    use crate::error::ErrorKind;

    #[test]
    fn test_virtual_hosted_and_path_style() {
        let um = UrlMaker::new("https://oss-cn-hangzhou.aliyuncs.com", false, false, false).unwrap();
        assert_eq!(AddressingType::VirtualHosted, um.addressing());
        assert_eq!(
            "https://buk.oss-cn-hangzhou.aliyuncs.com/a%2Fb.txt",
            um.url("buk", "a/b.txt", "")
        );

        let um = UrlMaker::new("https://oss-cn-hangzhou.aliyuncs.com", false, true, false).unwrap();
        assert_eq!(
            "https://oss-cn-hangzhou.aliyuncs.com/buk/a%2Fb.txt",
            um.url("buk", "a/b.txt", "")
        );
    }

    #[test]
    fn test_ip_and_cname() {
        let um = UrlMaker::new("127.0.0.1:8080", true, false, false).unwrap();
        assert_eq!(AddressingType::Ip, um.addressing());
        assert_eq!("http", um.scheme());
        assert_eq!("http://127.0.0.1:8080/buk/k%20v", um.url("buk", "k v", ""));
        assert_eq!("http://127.0.0.1:8080/", um.url("", "", ""));

        let um = UrlMaker::new("http://[::1]:9000", false, false, false).unwrap();
        assert_eq!(AddressingType::Ip, um.addressing());

        let um = UrlMaker::new("https://static.example.com", true, false, false).unwrap();
        assert_eq!(AddressingType::Cname, um.addressing());
        assert_eq!(
            "https://static.example.com/img.png?acl",
            um.url("ignored", "img.png", "acl")
        );
    }

    #[test]
    fn test_bucketless_service_url() {
        let um = UrlMaker::new("oss-cn-beijing.aliyuncs.com", false, false, false).unwrap();
        assert_eq!("http://oss-cn-beijing.aliyuncs.com/", um.url("", "", ""));
    }

    #[test]
    fn test_rtmp_url() {
        let um = UrlMaker::new("oss-cn-beijing.aliyuncs.com", false, false, false).unwrap();
        assert_eq!(
            "rtmp://buk.oss-cn-beijing.aliyuncs.com/live/my%20channel?Expires=1",
            um.rtmp_url("buk", "my channel", "Expires=1")
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = UrlMaker::new("https://", false, false, false).unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
        let err = UrlMaker::new("http://bad host", false, false, false).unwrap_err();
        assert_eq!(&ErrorKind::InputInvalid, err.kind());
    }

    #[test]
    fn test_escape() {
        assert_eq!("a%2Bb%20c~-_.", query_escape("a+b c~-_."));
        assert_eq!("a+b", query_unescape("a%2Bb").unwrap());
        assert_eq!("c d", query_unescape("c+d").unwrap());
    }

    #[test]
    fn test_encode_params() {
        let mut params = Params::new();
        params.insert("uploadId".to_owned(), Some("x y".to_owned()));
        params.insert("partNumber".to_owned(), Some("3".to_owned()));
        params.insert("acl".to_owned(), None);
        params.insert("empty".to_owned(), Some(String::new()));
        assert_eq!("acl&empty&partNumber=3&uploadId=x%20y", encode_params(&params));
    }
}
