/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::{HeaderMap, Method};
use sha1::Sha1;
use sha2::Sha256;

use crate::credentials::Credentials;
use crate::http::header;
use crate::types::AuthVersion;
use crate::url::{query_escape, Params};

// query parameter names used by pre-signed and live channel URLs
pub(crate) const PARAM_SECURITY_TOKEN: &str = "security-token";
pub(crate) const PARAM_ACCESS_KEY_ID: &str = "OSSAccessKeyId";
pub(crate) const PARAM_EXPIRES: &str = "Expires";
pub(crate) const PARAM_SIGNATURE: &str = "Signature";
pub(crate) const PARAM_PLAYLIST_NAME: &str = "playlistName";
pub(crate) const PARAM_SIGNATURE_VERSION: &str = "x-oss-signature-version";
pub(crate) const PARAM_EXPIRES_V2: &str = "x-oss-expires";
pub(crate) const PARAM_ACCESS_KEY_ID_V2: &str = "x-oss-access-key-id";
pub(crate) const PARAM_SIGNATURE_V2: &str = "x-oss-signature";
pub(crate) const PARAM_ADDITIONAL_HEADERS_V2: &str = "x-oss-additional-headers";

/// Query parameters that take part in the v1 canonicalized resource
const SIGNED_SUBRESOURCES: &[&str] = &[
    "acl",
    "append",
    "asyncFetch",
    "bucketInfo",
    "callback",
    "callback-var",
    "cloudboxes",
    "cname",
    "comp",
    "continuation-token",
    "cors",
    "delete",
    "encryption",
    "endTime",
    "img",
    "inventory",
    "inventoryId",
    "lifecycle",
    "live",
    "location",
    "logging",
    "metaQuery",
    "objectMeta",
    "partNumber",
    "policy",
    "position",
    "qos",
    "qosInfo",
    "referer",
    "regionList",
    "replication",
    "replicationLocation",
    "replicationProgress",
    "requestPayment",
    "resourceGroup",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "responseHeader",
    "restore",
    "rtc",
    "security-token",
    "sequential",
    "startTime",
    "stat",
    "status",
    "style",
    "styleName",
    "symlink",
    "tagging",
    "transferAcceleration",
    "udf",
    "udfApplication",
    "udfApplicationLog",
    "udfId",
    "udfImage",
    "udfImageDesc",
    "udfName",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "vod",
    "website",
    "withHashContext",
    "worm",
    "wormExtend",
    "wormId",
    "x-oss-ac-forward-allow",
    "x-oss-ac-source-ip",
    "x-oss-ac-subnet-mask",
    "x-oss-ac-vpc-id",
    "x-oss-async-process",
    "x-oss-enable-md5",
    "x-oss-enable-sha1",
    "x-oss-enable-sha256",
    "x-oss-hash-ctx",
    "x-oss-md5-ctx",
    "x-oss-process",
    "x-oss-request-payer",
    "x-oss-traffic-limit",
];

/// Whether `key` is part of the v1 canonicalized resource
pub(crate) fn is_signed_subresource(key: &str) -> bool {
    SIGNED_SUBRESOURCES.binary_search(&key).is_ok()
}

/// Format a timestamp the way the `Date` header expects it (RFC 1123, GMT)
pub(crate) fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn hmac_sha1(secret: &str, data: &str) -> String {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn hmac_sha256(secret: &str, data: &str) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Computes request signatures under one of the supported schemes
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signer<'a> {
    version: AuthVersion,
    additional_headers: &'a [String],
}

impl<'a> Signer<'a> {
    pub(crate) fn new(version: AuthVersion, additional_headers: &'a [String]) -> Self {
        Self {
            version,
            additional_headers,
        }
    }

    fn is_v2(&self) -> bool {
        self.version == AuthVersion::V2
    }

    /// Configured additional headers actually present on the request, lowercased and sorted
    pub(crate) fn additional_header_keys(&self, headers: &HeaderMap) -> Vec<String> {
        if !self.is_v2() {
            return Vec::new();
        }
        let mut keys: Vec<String> = self
            .additional_headers
            .iter()
            .map(|k| k.to_ascii_lowercase())
            .filter(|k| header::get(headers, k).is_some_and(|v| !v.is_empty()))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Subresource part of the canonicalized resource
    pub(crate) fn sub_resource(&self, params: &Params) -> String {
        let mut entries: Vec<(String, Option<String>)> = if self.is_v2() {
            params
                .iter()
                .map(|(k, v)| {
                    let v = v.as_deref().filter(|v| !v.is_empty()).map(query_escape);
                    (query_escape(k), v)
                })
                .collect()
        } else {
            params
                .iter()
                .filter(|(k, _)| is_signed_subresource(k))
                .map(|(k, v)| (k.clone(), v.clone().filter(|v| !v.is_empty())))
                .collect()
        };
        // escaping may change the relative order of keys
        entries.sort();

        let mut out = String::new();
        for (k, v) in entries {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(&k);
            if let Some(v) = v {
                out.push('=');
                out.push_str(&v);
            }
        }
        out
    }

    /// Canonicalized resource for `(bucket, object)` plus the subresource string
    pub(crate) fn resource(&self, bucket: &str, object: &str, sub_resource: &str) -> String {
        let sub = if sub_resource.is_empty() {
            String::new()
        } else {
            format!("?{sub_resource}")
        };

        match (bucket.is_empty(), self.is_v2()) {
            (true, true) => format!("{}{sub}", query_escape("/")),
            (true, false) => format!("/{sub}"),
            (false, true) => format!(
                "{}{}{sub}",
                query_escape(&format!("/{bucket}/")),
                query_escape(object)
            ),
            (false, false) => format!("/{bucket}/{object}{sub}"),
        }
    }

    /// The string the signature is computed over
    pub(crate) fn string_to_sign(&self, method: &Method, headers: &HeaderMap, resource: &str) -> String {
        let additional = self.additional_header_keys(headers);

        // HeaderMap names are already lowercase, keep the first value of repeated headers
        let mut canonical: Vec<(&str, &str)> = headers
            .keys()
            .map(|name| name.as_str())
            .filter(|name| name.starts_with(header::OSS_PREFIX) || additional.iter().any(|a| a == name))
            .filter_map(|name| header::get(headers, name).map(|v| (name, v)))
            .collect();
        canonical.sort();

        let mut out = String::new();
        out.push_str(method.as_str());
        out.push('\n');
        for name in ["content-md5", "content-type", "date"] {
            out.push_str(header::get(headers, name).unwrap_or_default());
            out.push('\n');
        }
        for (name, value) in canonical {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        if self.is_v2() {
            out.push_str(&additional.join(";"));
            out.push('\n');
        }
        out.push_str(resource);
        out
    }

    /// Base64 signature over `string_to_sign`
    pub(crate) fn signature(&self, secret: &str, string_to_sign: &str) -> String {
        if self.is_v2() {
            hmac_sha256(secret, string_to_sign)
        } else {
            hmac_sha1(secret, string_to_sign)
        }
    }

    /// Value of the `Authorization` header for a request
    pub(crate) fn authorization(
        &self,
        method: &Method,
        headers: &HeaderMap,
        resource: &str,
        credentials: &Credentials,
    ) -> String {
        let sts = self.string_to_sign(method, headers, resource);
        let signature = self.signature(credentials.access_key_secret(), &sts);
        tracing::trace!(string_to_sign = ?sts, "signed request");

        if !self.is_v2() {
            return format!("OSS {}:{signature}", credentials.access_key_id());
        }

        let additional = self.additional_header_keys(headers);
        if additional.is_empty() {
            format!(
                "OSS2 AccessKeyId:{},Signature:{signature}",
                credentials.access_key_id()
            )
        } else {
            format!(
                "OSS2 AccessKeyId:{},AdditionalHeaders:{},Signature:{signature}",
                credentials.access_key_id(),
                additional.join(";")
            )
        }
    }

    /// Extend `params` with the query parameters of a pre-signed URL.
    ///
    /// `headers` must already carry the headers the URL will be used with. The `Date` header is
    /// replaced by `expires` (Unix seconds).
    pub(crate) fn presign(
        &self,
        method: &Method,
        bucket: &str,
        object: &str,
        expires: i64,
        params: &mut Params,
        headers: &mut HeaderMap,
        credentials: &Credentials,
    ) {
        let expires = expires.to_string();
        if let Some(token) = credentials.security_token() {
            params.insert(PARAM_SECURITY_TOKEN.to_owned(), Some(token.to_owned()));
        }
        if let Ok(date) = http::HeaderValue::from_str(&expires) {
            headers.insert(http::header::DATE, date);
        }

        if self.is_v2() {
            params.insert(PARAM_SIGNATURE_VERSION.to_owned(), Some("OSS2".to_owned()));
            params.insert(PARAM_EXPIRES_V2.to_owned(), Some(expires.clone()));
            params.insert(
                PARAM_ACCESS_KEY_ID_V2.to_owned(),
                Some(credentials.access_key_id().to_owned()),
            );
            let additional = self.additional_header_keys(headers);
            if !additional.is_empty() {
                params.insert(
                    PARAM_ADDITIONAL_HEADERS_V2.to_owned(),
                    Some(additional.join(";")),
                );
            }
        }

        let sub = self.sub_resource(params);
        let resource = self.resource(bucket, object, &sub);
        let sts = self.string_to_sign(method, headers, &resource);
        let signature = self.signature(credentials.access_key_secret(), &sts);

        if self.is_v2() {
            params.insert(PARAM_SIGNATURE_V2.to_owned(), Some(signature));
        } else {
            params.insert(PARAM_EXPIRES.to_owned(), Some(expires));
            params.insert(
                PARAM_ACCESS_KEY_ID.to_owned(),
                Some(credentials.access_key_id().to_owned()),
            );
            params.insert(PARAM_SIGNATURE.to_owned(), Some(signature));
        }
    }
}

/// Query parameters of a signed live channel push URL
pub(crate) fn rtmp_params(
    bucket: &str,
    channel: &str,
    playlist_name: Option<&str>,
    expires: i64,
    credentials: &Credentials,
) -> Params {
    let mut params = Params::new();
    if let Some(playlist) = playlist_name.filter(|p| !p.is_empty()) {
        params.insert(PARAM_PLAYLIST_NAME.to_owned(), Some(playlist.to_owned()));
    }
    params.insert(PARAM_EXPIRES.to_owned(), Some(expires.to_string()));
    if credentials.access_key_id().is_empty() {
        return params;
    }

    params.insert(
        PARAM_ACCESS_KEY_ID.to_owned(),
        Some(credentials.access_key_id().to_owned()),
    );
    if let Some(token) = credentials.security_token() {
        params.insert(PARAM_SECURITY_TOKEN.to_owned(), Some(token.to_owned()));
    }

    let mut sts = format!("{expires}\n");
    // params is ordered by key
    for (k, v) in &params {
        if matches!(
            k.as_str(),
            PARAM_ACCESS_KEY_ID | PARAM_SIGNATURE | PARAM_EXPIRES | PARAM_SECURITY_TOKEN
        ) {
            continue;
        }
        sts.push_str(&format!("{k}:{}\n", v.as_deref().unwrap_or_default()));
    }
    sts.push_str(&format!("/{bucket}/{channel}"));

    let signature = hmac_sha1(credentials.access_key_secret(), &sts);
    params.insert(PARAM_SIGNATURE.to_owned(), Some(signature));
    params
}

#[cfg(test)]
mod test {
    use http::{HeaderMap, HeaderValue, Method};

    use super::{hmac_sha1, is_signed_subresource, rtmp_params, Signer, SIGNED_SUBRESOURCES};
    use crate::credentials::Credentials;
    use crate::types::AuthVersion;
    use crate::url::Params;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    fn params(pairs: &[(&str, Option<&str>)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
            .collect()
    }

    #[test]
    fn test_whitelist_sorted() {
        let mut sorted = SIGNED_SUBRESOURCES.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, SIGNED_SUBRESOURCES);
        assert!(is_signed_subresource("uploadId"));
        assert!(!is_signed_subresource("max-keys"));
    }

    #[test]
    fn test_sign_v1() {
        let signer = Signer::new(AuthVersion::V1, &[]);
        let headers = headers(&[
            ("date", "Wed, 23 Aug 2023 10:00:00 GMT"),
            ("content-type", "text/plain"),
            ("x-oss-meta-author", "foo"),
        ]);
        let sts = signer.string_to_sign(&Method::PUT, &headers, "/examplebucket/nelson");
        assert_eq!(
            "PUT\n\ntext/plain\nWed, 23 Aug 2023 10:00:00 GMT\nx-oss-meta-author:foo\n/examplebucket/nelson",
            sts
        );

        let creds = Credentials::new("test-key", "test-secret", None);
        let auth = signer.authorization(&Method::PUT, &headers, "/examplebucket/nelson", &creds);
        assert_eq!(format!("OSS test-key:{}", hmac_sha1("test-secret", &sts)), auth);
        // deterministic
        assert_eq!(
            auth,
            signer.authorization(&Method::PUT, &headers, "/examplebucket/nelson", &creds)
        );
    }

    #[test]
    fn test_header_order_independent() {
        let signer = Signer::new(AuthVersion::V1, &[]);
        let a = headers(&[("x-oss-meta-b", "2"), ("x-oss-meta-a", "1"), ("date", "d")]);
        let b = headers(&[("date", "d"), ("x-oss-meta-a", "1"), ("x-oss-meta-b", "2")]);
        let sts = signer.string_to_sign(&Method::GET, &a, "/b/o");
        assert_eq!(sts, signer.string_to_sign(&Method::GET, &b, "/b/o"));
        assert!(sts.contains("x-oss-meta-a:1\nx-oss-meta-b:2\n"));
    }

    #[test]
    fn test_sub_resource_whitelist() {
        let v1 = Signer::new(AuthVersion::V1, &[]);
        let with_extra = params(&[("uploadId", Some("id")), ("max-keys", Some("10")), ("acl", None)]);
        let without = params(&[("uploadId", Some("id")), ("acl", None)]);
        assert_eq!("acl&uploadId=id", v1.sub_resource(&with_extra));
        assert_eq!(v1.sub_resource(&with_extra), v1.sub_resource(&without));

        let v2 = Signer::new(AuthVersion::V2, &[]);
        assert_ne!(v2.sub_resource(&with_extra), v2.sub_resource(&without));
        assert_eq!("acl&max-keys=10&uploadId=id", v2.sub_resource(&with_extra));
    }

    #[test]
    fn test_resource() {
        let v1 = Signer::new(AuthVersion::V1, &[]);
        assert_eq!("/b/a b?acl", v1.resource("b", "a b", "acl"));
        assert_eq!("/", v1.resource("", "", ""));

        let v2 = Signer::new(AuthVersion::V2, &[]);
        assert_eq!("%2Fb%2Fa%2Fc%20d?acl", v2.resource("b", "a/c d", "acl"));
        assert_eq!("%2F", v2.resource("", "", ""));
    }

    #[test]
    fn test_sign_v2_additional_headers() {
        let extra = vec!["host".to_owned(), "range".to_owned()];
        let signer = Signer::new(AuthVersion::V2, &extra);
        let headers = headers(&[
            ("date", "d"),
            ("host", "b.example.com"),
            ("x-oss-meta-a", "1"),
        ]);
        let sts = signer.string_to_sign(&Method::GET, &headers, "%2Fb%2Fo");
        assert_eq!(
            "GET\n\n\nd\nhost:b.example.com\nx-oss-meta-a:1\nhost\n%2Fb%2Fo",
            sts
        );

        let creds = Credentials::new("k", "s", None);
        let auth = signer.authorization(&Method::GET, &headers, "%2Fb%2Fo", &creds);
        assert!(auth.starts_with("OSS2 AccessKeyId:k,AdditionalHeaders:host,Signature:"));

        let bare = Signer::new(AuthVersion::V2, &[]);
        let auth = bare.authorization(&Method::GET, &headers, "%2Fb%2Fo", &creds);
        assert!(auth.starts_with("OSS2 AccessKeyId:k,Signature:"));
    }

    #[test]
    fn test_presign_v1() {
        let signer = Signer::new(AuthVersion::V1, &[]);
        let creds = Credentials::new("k", "s", Some("tok".to_owned()));
        let mut params = Params::new();
        let mut headers = HeaderMap::new();
        signer.presign(&Method::GET, "b", "o", 1700000000, &mut params, &mut headers, &creds);

        assert_eq!(Some(&Some("1700000000".to_owned())), params.get("Expires"));
        assert_eq!(Some(&Some("k".to_owned())), params.get("OSSAccessKeyId"));
        assert_eq!(Some(&Some("tok".to_owned())), params.get("security-token"));
        let expected = hmac_sha1("s", "GET\n\n\n1700000000\n/b/o?security-token=tok");
        assert_eq!(Some(&Some(expected)), params.get("Signature"));
    }

    #[test]
    fn test_presign_v2() {
        let signer = Signer::new(AuthVersion::V2, &[]);
        let creds = Credentials::new("k", "s", None);
        let mut params = Params::new();
        let mut headers = HeaderMap::new();
        signer.presign(&Method::PUT, "b", "o", 60, &mut params, &mut headers, &creds);

        assert_eq!(Some(&Some("OSS2".to_owned())), params.get("x-oss-signature-version"));
        assert_eq!(Some(&Some("60".to_owned())), params.get("x-oss-expires"));
        assert_eq!(Some(&Some("k".to_owned())), params.get("x-oss-access-key-id"));
        assert!(params.contains_key("x-oss-signature"));
        assert!(!params.contains_key("Signature"));
    }

    #[test]
    fn test_rtmp_params() {
        let creds = Credentials::new("k", "s", Some("tok".to_owned()));
        let params = rtmp_params("b", "ch", Some("list.m3u8"), 100, &creds);
        let expected = hmac_sha1("s", "100\nplaylistName:list.m3u8\n/b/ch");
        assert_eq!(Some(&Some(expected)), params.get("Signature"));
        assert_eq!(Some(&Some("tok".to_owned())), params.get("security-token"));
    }
}
