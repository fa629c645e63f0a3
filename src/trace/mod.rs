// Trace module - path trace targets, platform strategies and output parsing

pub mod extract;
pub mod runner;

use std::fmt;
use std::time::Duration;

use crate::error::TargetError;

/// Longest hostname the DNS allows
const MAX_TARGET_LEN: usize = 253;

/// A hostname or IPv4 literal that is safe to hand to the trace utility
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceTarget(String);

impl TraceTarget {
    /// Validate caller input.
    ///
    /// Only `[A-Za-z0-9.-]` is accepted and a leading `-` is refused, so the
    /// value can neither carry shell metacharacters nor be read as an option
    /// by `traceroute`/`tracert`.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let target = raw.trim();

        if target.is_empty() {
            return Err(TargetError::Empty);
        }
        if target.len() > MAX_TARGET_LEN {
            return Err(TargetError::TooLong(target.len()));
        }
        if target.starts_with('-') {
            return Err(TargetError::LeadingHyphen);
        }
        if let Some(c) = target
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
        {
            return Err(TargetError::IllegalCharacter(c));
        }

        Ok(TraceTarget(target.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the host platform's path-tracing utility is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStrategy {
    /// `traceroute` on Linux, macOS and the BSDs
    Posix,
    /// `tracert` on Windows
    Windows,
}

impl TraceStrategy {
    /// Pick the strategy matching the platform this binary was built for
    pub fn for_host() -> Self {
        if cfg!(target_os = "windows") {
            TraceStrategy::Windows
        } else {
            TraceStrategy::Posix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraceStrategy::Posix => "posix-trace",
            TraceStrategy::Windows => "windows-trace",
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            TraceStrategy::Posix => "traceroute",
            TraceStrategy::Windows => "tracert",
        }
    }

    pub fn default_probe_timeout(&self) -> Duration {
        match self {
            TraceStrategy::Posix => Duration::from_secs(1),
            TraceStrategy::Windows => Duration::from_millis(500),
        }
    }

    /// Build the argument vector; the target is always the last, discrete element
    pub fn args(&self, target: &TraceTarget, settings: &TraceSettings) -> Vec<String> {
        let probe_timeout = settings
            .probe_timeout
            .unwrap_or_else(|| self.default_probe_timeout());

        match self {
            TraceStrategy::Posix => {
                // traceroute -w takes whole seconds on BSD-derived implementations
                let secs = probe_timeout.as_millis().div_ceil(1000).max(1);
                vec![
                    "-n".to_string(), // numeric output, no reverse DNS
                    "-m".to_string(),
                    settings.max_hops.to_string(),
                    "-w".to_string(),
                    secs.to_string(),
                    target.as_str().to_string(),
                ]
            }
            TraceStrategy::Windows => vec![
                "-d".to_string(), // numeric output, no reverse DNS
                "-h".to_string(),
                settings.max_hops.to_string(),
                "-w".to_string(),
                probe_timeout.as_millis().max(1).to_string(),
                target.as_str().to_string(),
            ],
        }
    }

    /// Drop the banner line that names the destination before the hop list.
    ///
    /// Both utilities print `traceroute to 8.8.8.8 (8.8.8.8), ...` or
    /// `Tracing route to 8.8.8.8 over ...` first; left in, the destination
    /// would be extracted as the first hop.
    pub fn strip_banner<'a>(&self, output: &'a str) -> Vec<&'a str> {
        let banner = match self {
            TraceStrategy::Posix => "traceroute to ",
            TraceStrategy::Windows => "Tracing route to ",
        };

        output
            .lines()
            .filter(|line| !line.trim_start().starts_with(banner))
            .collect()
    }
}

impl fmt::Display for TraceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounds applied to every trace
#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub max_hops: u8,
    /// Per-probe wait; `None` uses the strategy default
    pub probe_timeout: Option<Duration>,
    /// Wall-clock limit for the whole trace process
    pub process_timeout: Duration,
}

impl Default for TraceSettings {
    fn default() -> Self {
        TraceSettings {
            max_hops: 15,
            probe_timeout: None,
            process_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_hostnames_and_ipv4() {
        assert_eq!(TraceTarget::parse("google.com").unwrap().as_str(), "google.com");
        assert_eq!(TraceTarget::parse(" 8.8.8.8 \n").unwrap().as_str(), "8.8.8.8");
        assert!(TraceTarget::parse("my-host.example-domain.org").is_ok());
    }

    #[test]
    fn test_parse_rejects_injection() {
        assert_eq!(
            TraceTarget::parse("example.com; rm -rf /"),
            Err(TargetError::IllegalCharacter(';'))
        );
        assert_eq!(
            TraceTarget::parse("$(reboot)"),
            Err(TargetError::IllegalCharacter('$'))
        );
        assert_eq!(
            TraceTarget::parse("a.com|cat"),
            Err(TargetError::IllegalCharacter('|'))
        );
        assert_eq!(
            TraceTarget::parse("host name"),
            Err(TargetError::IllegalCharacter(' '))
        );
    }

    #[test]
    fn test_parse_rejects_option_lookalikes() {
        assert_eq!(TraceTarget::parse("-F"), Err(TargetError::LeadingHyphen));
        assert_eq!(TraceTarget::parse("--help"), Err(TargetError::LeadingHyphen));
    }

    #[test]
    fn test_parse_rejects_empty_and_long() {
        assert_eq!(TraceTarget::parse(""), Err(TargetError::Empty));
        assert_eq!(TraceTarget::parse("   "), Err(TargetError::Empty));
        let long = "a".repeat(254);
        assert_eq!(TraceTarget::parse(&long), Err(TargetError::TooLong(254)));
    }

    #[test]
    fn test_parse_rejects_ipv6() {
        assert_eq!(
            TraceTarget::parse("2001:db8::1"),
            Err(TargetError::IllegalCharacter(':'))
        );
    }

    #[test]
    fn test_posix_args() {
        let target = TraceTarget::parse("example.com").unwrap();
        let args = TraceStrategy::Posix.args(&target, &TraceSettings::default());
        assert_eq!(args, vec!["-n", "-m", "15", "-w", "1", "example.com"]);
    }

    #[test]
    fn test_posix_probe_timeout_rounds_up() {
        let target = TraceTarget::parse("example.com").unwrap();
        let settings = TraceSettings {
            probe_timeout: Some(Duration::from_millis(1500)),
            ..TraceSettings::default()
        };
        let args = TraceStrategy::Posix.args(&target, &settings);
        assert_eq!(args[4], "2");
    }

    #[test]
    fn test_windows_args() {
        let target = TraceTarget::parse("8.8.8.8").unwrap();
        let args = TraceStrategy::Windows.args(&target, &TraceSettings::default());
        assert_eq!(args, vec!["-d", "-h", "15", "-w", "500", "8.8.8.8"]);
        assert_eq!(TraceStrategy::Windows.program(), "tracert");
    }

    #[test]
    fn test_strip_banner() {
        let posix = "traceroute to 8.8.8.8 (8.8.8.8), 15 hops max, 60 byte packets\n 1  10.0.0.1  1.2 ms\n";
        assert_eq!(TraceStrategy::Posix.strip_banner(posix), vec![" 1  10.0.0.1  1.2 ms"]);

        let windows = "\r\nTracing route to 8.8.8.8 over a maximum of 15 hops\r\n\r\n  1     1 ms     1 ms     1 ms  192.168.1.1\r\n";
        let lines = TraceStrategy::Windows.strip_banner(windows);
        assert!(lines.iter().all(|l| !l.contains("Tracing route")));
        assert!(lines.iter().any(|l| l.contains("192.168.1.1")));
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(TraceStrategy::Posix.to_string(), "posix-trace");
        assert_eq!(TraceStrategy::Windows.to_string(), "windows-trace");
    }
}
