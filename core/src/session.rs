//! Blocking transport that runs `CrmClient` requests over `ureq`.
//!
//! # Design
//! `Session` is the convenience layer for callers that do not bring their
//! own HTTP stack: each method is `build_*`, one `ureq` round-trip, then
//! `parse_*`. The agent is configured with `http_status_as_error(false)` so
//! 4xx/5xx responses reach the client's status mapping instead of surfacing
//! as transport errors. No retries, no pagination.

use serde::Serialize;
use tracing::debug;

use crate::client::{CrmClient, Payload};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resource::{Query, ResourcePath};

pub struct Session {
    client: CrmClient,
    agent: ureq::Agent,
}

impl Session {
    pub fn new(client: CrmClient) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { client, agent }
    }

    /// Build a client from `config` and, when it carries credentials, fetch
    /// the bootstrap document to verify them and warm the cache.
    pub fn connect(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut session = Session::new(CrmClient::new(config)?);
        if session.client.is_authenticated() {
            session.bootstrap()?;
        }
        Ok(session)
    }

    /// Exchange a user name and password for API credentials, then fetch
    /// the bootstrap document like `connect` does. The returned session uses
    /// `config`'s base URL and response type, and its cached `user` is the
    /// login payload.
    pub fn login(config: &ClientConfig, user_name: &str, password: &str) -> Result<Self, ApiError> {
        let mut anonymous = Session::new(
            CrmClient::anonymous(&config.base_url).with_response_type(config.response_type),
        );
        let request = anonymous.client.build_login(user_name, password)?;
        let response = anonymous.execute(request)?;
        let client = anonymous.client.parse_login(response)?;

        let user = client.bootstrap().user.clone();
        let mut session = Session {
            client,
            agent: anonymous.agent,
        };
        session.bootstrap()?;
        session.client.bootstrap_mut().user = user;
        Ok(session)
    }

    pub fn client(&self) -> &CrmClient {
        &self.client
    }

    pub fn into_client(self) -> CrmClient {
        self.client
    }

    pub fn bootstrap(&mut self) -> Result<Payload, ApiError> {
        let request = self.client.build_bootstrap()?;
        self.send(request)
    }

    pub fn get(&mut self, path: &ResourcePath, query: &Query) -> Result<Payload, ApiError> {
        let request = self.client.build_get(path, query)?;
        self.send(request)
    }

    pub fn post<B: Serialize + ?Sized>(
        &mut self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<Payload, ApiError> {
        let request = self.client.build_post(path, resource, query)?;
        self.send(request)
    }

    pub fn put<B: Serialize + ?Sized>(
        &mut self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<Payload, ApiError> {
        let request = self.client.build_put(path, resource, query)?;
        self.send(request)
    }

    pub fn patch<B: Serialize + ?Sized>(
        &mut self,
        path: &ResourcePath,
        resource: &B,
        query: &Query,
    ) -> Result<Payload, ApiError> {
        let request = self.client.build_patch(path, resource, query)?;
        self.send(request)
    }

    pub fn delete(&mut self, path: &ResourcePath, query: &Query) -> Result<Payload, ApiError> {
        let request = self.client.build_delete(path, query)?;
        self.send(request)
    }

    pub fn get_contacts(
        &mut self,
        contact_id: Option<&str>,
        sub_resource: Option<&str>,
        query: &Query,
    ) -> Result<Payload, ApiError> {
        let request = self.client.build_get_contacts(contact_id, sub_resource, query)?;
        let response = self.execute(request)?;
        self.client.parse_contacts(response)
    }

    fn send(&mut self, request: HttpRequest) -> Result<Payload, ApiError> {
        let response = self.execute(request)?;
        self.client.parse_response(response)
    }

    /// Run one request. Only connection-level failures are errors here.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let result = match method {
            HttpMethod::Get | HttpMethod::Delete => {
                let mut builder = if method == HttpMethod::Get {
                    self.agent.get(&url)
                } else {
                    self.agent.delete(&url)
                };
                for (key, value) in &headers {
                    builder = builder.header(key.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post | HttpMethod::Put => {
                let mut builder = if method == HttpMethod::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                for (key, value) in &headers {
                    builder = builder.header(key.as_str(), value.as_str());
                }
                builder.send(body.unwrap_or_default().as_bytes())
            }
        };

        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        debug!(status, "received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Answer one request with `response` and return the API base URL.
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            stream.write_all(&response).unwrap();
        });
        format!("http://{addr}/api/v3")
    }

    fn latin1_response(status_line: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status_line}\r\n\
             Content-Type: text/html; charset=iso-8859-1\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[test]
    fn execute_decodes_non_utf8_body_lossily() {
        let base = serve_once(latin1_response("200 OK", b"caf\xe9"));
        let session = Session::new(CrmClient::anonymous(&base));
        let request = session.client().build_bootstrap().unwrap();

        let response = session.execute(request).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "caf\u{fffd}");
    }

    #[test]
    fn non_utf8_server_error_is_still_status_mapped() {
        let base = serve_once(latin1_response(
            "503 Service Unavailable",
            b"<html>Service indisponible \xe0 cette heure</html>",
        ));
        let mut session = Session::new(CrmClient::anonymous(&base));

        let err = session
            .get(&ResourcePath::new("contacts"), &Query::new())
            .unwrap_err();
        match err {
            ApiError::Unknown { status, .. } => assert_eq!(status, 503),
            other => panic!("expected Unknown error, got {other:?}"),
        }
    }
}
