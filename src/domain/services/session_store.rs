#[cfg(test)]
#[path = "session_store_test.rs"]
mod tests;

use cookie::Cookie;
use cookie::SameSite;
use rand::Rng;
use time::Duration;
use time::OffsetDateTime;

use crate::infrastructure::page::CookieJar;

pub const SESSION_COOKIE_PREFIX: &str = "alphablocks-sessionId-";
pub const SESSION_ID_LENGTH: usize = 8;
pub const SESSION_COOKIE_TTL_DAYS: i64 = 7;
pub const CART_COOKIE: &str = "cart";
pub const CART_SIG_COOKIE: &str = "cart_sig";

const SESSION_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    pub id: String,
    /// False when the id was minted by this call.
    pub existed: bool,
}

pub struct SessionStore {}

impl SessionStore {
    pub fn generate_id(length: usize) -> String {
        let mut rng = rand::thread_rng();
        return (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..SESSION_ID_ALPHABET.len());
                return SESSION_ID_ALPHABET[idx] as char;
            })
            .collect();
    }

    /// Only ids this store could have minted are honoured. Anything else,
    /// including old placeholder values, reads as "no session yet".
    pub fn is_valid_id(id: &str) -> bool {
        return id.len() == SESSION_ID_LENGTH
            && id.bytes().all(|e| return SESSION_ID_ALPHABET.contains(&e));
    }

    /// Session cookies are keyed per assistant, falling back to the token
    /// while the assistant id is still unknown. An id minted under the token
    /// key is carried over with [`SessionStore::adopt`] once the assistant
    /// id resolves.
    pub fn cookie_key(assistant_id: Option<u64>, token: &str) -> String {
        return match assistant_id {
            Some(id) => format!("{SESSION_COOKIE_PREFIX}{id}"),
            None => format!("{SESSION_COOKIE_PREFIX}{token}"),
        };
    }

    /// Reads `name` from the cookie header. Absence is an empty string, not
    /// an error.
    pub fn get_cookie(jar: &CookieJar, name: &str) -> String {
        return Cookie::split_parse(jar.read())
            .filter_map(|e| return e.ok())
            .find(|e| return e.name() == name)
            .map(|e| return e.value().to_string())
            .unwrap_or_default();
    }

    /// Mints a fresh id under `name` with a seven day expiry.
    pub fn set_cookie(jar: &mut CookieJar, name: &str) -> String {
        let session_id = SessionStore::generate_id(SESSION_ID_LENGTH);
        SessionStore::write_session_cookie(jar, name, &session_id);

        return session_id;
    }

    fn write_session_cookie(jar: &mut CookieJar, name: &str, session_id: &str) {
        let cookie = Cookie::build((name.to_string(), session_id.to_string()))
            .expires(OffsetDateTime::now_utc() + Duration::days(SESSION_COOKIE_TTL_DAYS))
            .path("/")
            .same_site(SameSite::Strict)
            .build();
        jar.write(&cookie.to_string());
    }

    /// Moves a valid session id from `from` to `to` unless `to` already holds
    /// one. Returns the id that now lives under `to`, if any.
    pub fn adopt(jar: &mut CookieJar, from: &str, to: &str) -> Option<String> {
        let current = SessionStore::get_cookie(jar, to);
        if SessionStore::is_valid_id(&current) {
            return Some(current);
        }

        let previous = SessionStore::get_cookie(jar, from);
        if from == to || !SessionStore::is_valid_id(&previous) {
            return None;
        }

        tracing::debug!(from = from, to = to, "Carrying session id over to assistant key");
        SessionStore::write_session_cookie(jar, to, &previous);

        return Some(previous);
    }

    pub fn get_or_create(jar: &mut CookieJar, name: &str) -> SessionCookie {
        let existing = SessionStore::get_cookie(jar, name);
        if SessionStore::is_valid_id(&existing) {
            return SessionCookie {
                id: existing,
                existed: true,
            };
        }

        if !existing.is_empty() {
            tracing::debug!(key = name, "Replacing invalid session id");
        }

        return SessionCookie {
            id: SessionStore::set_cookie(jar, name),
            existed: false,
        };
    }

    /// Writes an opaque value verbatim, as handed over by the assistant.
    pub fn write_cookie(jar: &mut CookieJar, name: &str, value: &str) {
        let cookie = Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .build();
        jar.write(&cookie.to_string());
    }
}
