use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::error::Error as _;
use std::time::Duration;
use url::Url;

use crate::models::{HttpMethod, TargetDefinition};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP transport for probes.
///
/// Server certificates are NOT verified: self-signed, expired and
/// mismatched certificates are all accepted so internal and test endpoints
/// can be probed. A successful probe says nothing about whether the
/// endpoint should be trusted.
#[derive(Debug, Clone)]
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { client })
    }

    /// Build the request for `target`. A form body is attached only for
    /// POST with a non-empty body.
    pub fn build_request(&self, target: &TargetDefinition, url: Url) -> reqwest::RequestBuilder {
        let request = match target.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };

        match target.form_body() {
            Some(body) => request.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body.to_owned()),
            None => request,
        }
    }

    /// Send the request and read the body to completion.
    ///
    /// Returns the status and the number of body bytes received.
    pub async fn send(
        &self,
        target: &TargetDefinition,
        url: Url,
    ) -> Result<(StatusCode, usize), reqwest::Error> {
        let mut response = self.build_request(target, url).send().await?;
        let status = response.status();

        let mut received = 0;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len();
        }

        Ok((status, received))
    }
}

/// Render a transport error with its causes, e.g.
/// `error sending request for url (...): tcp connect error: Connection refused`.
pub fn describe_error(error: &reqwest::Error) -> String {
    let mut message = if error.is_timeout() {
        "Request timed out".to_string()
    } else {
        error.to_string()
    };

    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> HttpChecker {
        HttpChecker::new(Duration::from_secs(5), "pieping-test").unwrap()
    }

    #[test]
    fn test_post_with_body_sets_form_content_type() {
        let target = TargetDefinition::new("form", "http://example.com/submit", 10.0)
            .with_post_body("a=1&b=2");
        let url = Url::parse(&target.url).unwrap();

        let request = checker().build_request(&target, url).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.headers().get(CONTENT_TYPE).unwrap(), FORM_CONTENT_TYPE);
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b"a=1&b=2"[..]));
    }

    #[test]
    fn test_get_and_empty_post_send_no_body() {
        let get = TargetDefinition::new("get", "http://example.com", 10.0);
        let request = checker()
            .build_request(&get, Url::parse(&get.url).unwrap())
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert!(request.body().is_none());
        assert!(request.headers().get(CONTENT_TYPE).is_none());

        let empty_post = TargetDefinition::new("post", "http://example.com", 10.0).with_post_body("");
        let request = checker()
            .build_request(&empty_post, Url::parse(&empty_post.url).unwrap())
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert!(request.body().is_none());
        assert!(request.headers().get(CONTENT_TYPE).is_none());
    }
}
