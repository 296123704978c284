//! Content-Type enforcement middleware.
//! Restricts a route to JSON request bodies.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::routing::{HandlerFuture, Middleware, Next};

const APPLICATION_JSON: &str = "application/json";

/// Reasons a `Content-Type` value cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaTypeError {
    #[error("no media type")]
    Missing,
    #[error("expected slash after first token")]
    MissingSlash,
    #[error("expected token after slash")]
    MissingSubtype,
    #[error("unexpected content after media subtype")]
    TrailingContent,
    #[error("invalid media parameter")]
    InvalidParameter,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn consume_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// Consume a quoted-string (leading `"` included), returning the rest.
fn consume_quoted(s: &str) -> Option<&str> {
    let mut escaped = false;
    for (idx, c) in s.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(&s[idx + 1..]),
            _ => {}
        }
    }
    None
}

fn check_params(mut rest: &str) -> Result<(), MediaTypeError> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }
        rest = rest
            .strip_prefix(';')
            .ok_or(MediaTypeError::InvalidParameter)?
            .trim_start();
        if rest.is_empty() {
            // trailing semicolon
            return Ok(());
        }

        let (key, after_key) = consume_token(rest);
        if key.is_empty() {
            return Err(MediaTypeError::InvalidParameter);
        }
        let after_eq = after_key
            .trim_start()
            .strip_prefix('=')
            .ok_or(MediaTypeError::InvalidParameter)?
            .trim_start();

        rest = if after_eq.starts_with('"') {
            consume_quoted(after_eq).ok_or(MediaTypeError::InvalidParameter)?
        } else {
            let (value, after_value) = consume_token(after_eq);
            if value.is_empty() {
                return Err(MediaTypeError::InvalidParameter);
            }
            after_value
        };
    }
}

/// Parse a `Content-Type` value and return its lower-cased media type.
pub fn parse_media_type(value: &str) -> Result<String, MediaTypeError> {
    let (media, params) = match value.find(';') {
        Some(idx) => value.split_at(idx),
        None => (value, ""),
    };
    let media = media.trim().to_ascii_lowercase();

    let (kind, rest) = consume_token(&media);
    if kind.is_empty() {
        return Err(MediaTypeError::Missing);
    }
    if !rest.is_empty() {
        let rest = rest.strip_prefix('/').ok_or(MediaTypeError::MissingSlash)?;
        let (subtype, trailing) = consume_token(rest);
        if subtype.is_empty() {
            return Err(MediaTypeError::MissingSubtype);
        }
        if !trailing.is_empty() {
            return Err(MediaTypeError::TrailingContent);
        }
    }

    check_params(params)?;
    Ok(media)
}

/// Rejects requests whose `Content-Type` is present but not `application/json`.
///
/// - absent or blank header: passed through
/// - malformed header: 400 Bad Request
/// - any other media type: 415 Unsupported Media Type
#[derive(Debug, Clone, Copy, Default)]
pub struct EnforceJson;

impl Middleware for EnforceJson {
    fn handle(&self, req: Request<Body>, next: Next) -> HandlerFuture {
        let verdict = match req.headers().get(header::CONTENT_TYPE) {
            None => Ok(()),
            Some(value) if value.as_bytes().iter().all(u8::is_ascii_whitespace) => Ok(()),
            Some(value) => match value.to_str().ok().map(parse_media_type) {
                Some(Ok(media)) if media == APPLICATION_JSON => Ok(()),
                Some(Ok(media)) => {
                    tracing::debug!(media_type = %media, "Rejected non-JSON content type");
                    Err((
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        "Content-Type header must be application/json\n",
                    ))
                }
                Some(Err(_)) | None => {
                    Err((StatusCode::BAD_REQUEST, "Malformed Content-Type header\n"))
                }
            },
        };

        match verdict {
            Ok(()) => next.run(req),
            Err(rejection) => Box::pin(async move { rejection.into_response() }),
        }
    }

    fn name(&self) -> &'static str {
        "enforce_json"
    }
}
