use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::{RateLimitSettings, WindowSettings};

/// Identity used for scopes that count all callers together.
pub const SHARED_IDENTITY: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    PerIp,
    Sheets,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::PerIp => "per_ip",
            Self::Sheets => "sheets",
        }
    }

    pub fn rejection_message(self) -> &'static str {
        match self {
            Self::Global => "Too many requests, please try again later",
            Self::PerIp => "Too many requests from this IP",
            Self::Sheets => "Sheets API rate limit exceeded",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical endpoint groups used to decide which scopes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Health,
    Sheets,
    OtherApi,
    Other,
}

/// Endpoints that never count against the global scope.
pub const GLOBAL_EXEMPT: &[Endpoint] = &[Endpoint::Health];

impl Endpoint {
    pub fn classify(path: &str) -> Self {
        if path == "/api/health" {
            Self::Health
        } else if path == "/api/sheets" || path.starts_with("/api/sheets/") {
            Self::Sheets
        } else if path == "/api" || path.starts_with("/api/") {
            Self::OtherApi
        } else {
            Self::Other
        }
    }

    /// Scopes this endpoint must pass, in evaluation order.
    pub fn scopes(self) -> impl Iterator<Item = Scope> {
        let global = (!GLOBAL_EXEMPT.contains(&self)).then_some(Scope::Global);
        let per_ip = (self != Self::Other).then_some(Scope::PerIp);
        let sheets = (self == Self::Sheets).then_some(Scope::Sheets);
        [global, per_ip, sheets].into_iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter keyed by caller identity.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, identity: &str) -> Decision {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(identity.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Decision::Limited { retry_after };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop windows that have fully elapsed and return how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub scope: Scope,
    pub retry_after: Duration,
}

impl Rejection {
    /// Whole seconds for the `Retry-After` header, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let rounded = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        rounded.max(1)
    }
}

/// The three independent scopes of the proxy.
#[derive(Debug)]
pub struct RateLimiters {
    global: FixedWindowLimiter,
    per_ip: FixedWindowLimiter,
    sheets: FixedWindowLimiter,
}

impl RateLimiters {
    pub fn new(global: FixedWindowLimiter, per_ip: FixedWindowLimiter, sheets: FixedWindowLimiter) -> Self {
        Self {
            global,
            per_ip,
            sheets,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let build = |scope: &WindowSettings| {
            FixedWindowLimiter::new(scope.window, scope.max_requests.get())
        };
        Self::new(
            build(&settings.global),
            build(&settings.per_ip),
            build(&settings.sheets),
        )
    }

    fn limiter(&self, scope: Scope) -> &FixedWindowLimiter {
        match scope {
            Scope::Global => &self.global,
            Scope::PerIp => &self.per_ip,
            Scope::Sheets => &self.sheets,
        }
    }

    pub fn allow(&self, scope: Scope, identity: &str) -> bool {
        matches!(self.limiter(scope).check(identity), Decision::Allowed { .. })
    }

    /// Evaluate every scope that applies to `endpoint`, stopping at the first
    /// rejection so later scopes are not charged.
    pub fn check(&self, endpoint: Endpoint, client_ip: &str) -> Result<(), Rejection> {
        for scope in endpoint.scopes() {
            let identity = match scope {
                Scope::PerIp => client_ip,
                Scope::Global | Scope::Sheets => SHARED_IDENTITY,
            };
            if let Decision::Limited { retry_after } = self.limiter(scope).check(identity) {
                return Err(Rejection { scope, retry_after });
            }
        }
        Ok(())
    }

    pub fn sweep(&self) -> usize {
        self.global.sweep() + self.per_ip.sweep() + self.sheets.sweep()
    }
}
