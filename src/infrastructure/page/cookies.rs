#[cfg(test)]
#[path = "cookies_test.rs"]
mod tests;

use cookie::Cookie;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct StoredCookie {
    cookie: Cookie<'static>,
    /// `Max-Age` resolved against the write time wins over `Expires`.
    expires_at: Option<OffsetDateTime>,
}

impl StoredCookie {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        return self.expires_at.map(|e| return e <= now).unwrap_or(false);
    }
}

/// Host cookie jar with `document.cookie` semantics: writes take a single
/// `name=value; Attr=...` string, reads return every live cookie joined by
/// `; `.
#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    pub fn write(&mut self, raw: &str) {
        self.write_at(raw, OffsetDateTime::now_utc());
    }

    pub fn write_at(&mut self, raw: &str, now: OffsetDateTime) {
        let cookie = match Cookie::parse(raw.to_string()) {
            Ok(cookie) => cookie,
            Err(err) => {
                tracing::trace!(error = ?err, raw = raw, "Ignored malformed cookie write");
                return;
            }
        };

        let expires_at = match cookie.max_age() {
            Some(max_age) => match now.checked_add(max_age) {
                Some(at) => Some(at),
                None if max_age.is_negative() => Some(now),
                None => None,
            },
            None => cookie.expires_datetime(),
        };

        let stored = StoredCookie { cookie, expires_at };
        self.cookies
            .retain(|e| return e.cookie.name() != stored.cookie.name());
        if !stored.is_expired(now) {
            self.cookies.push(stored);
        }
    }

    pub fn read(&self) -> String {
        return self.read_at(OffsetDateTime::now_utc());
    }

    pub fn read_at(&self, now: OffsetDateTime) -> String {
        return self
            .cookies
            .iter()
            .filter(|e| return !e.is_expired(now))
            .map(|e| return e.cookie.stripped().to_string())
            .collect::<Vec<String>>()
            .join("; ");
    }

    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        return self
            .cookies
            .iter()
            .find(|e| return e.cookie.name() == name)
            .map(|e| return &e.cookie);
    }
}
