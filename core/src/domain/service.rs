//! Service classification.
//!
//! A port/command pair is labelled by walking an ordered list of
//! `(Matcher, label)` rules; the first rule that matches wins. The tables
//! below are plain data so they can be inspected and tested on their own.

/// Label used when no rule matches.
pub const UNKNOWN: &str = "Unknown";

/// Well-known ports, checked before anything else.
pub const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (135, "RPC"),
    (139, "NetBIOS"),
    (143, "IMAP"),
    (443, "HTTPS"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (1521, "Oracle"),
    (3000, "React/Node"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5000, "Flask/Python"),
    (5432, "PostgreSQL"),
    (5672, "RabbitMQ"),
    (5900, "VNC"),
    (6379, "Redis"),
    (8000, "Django/Alt"),
    (8080, "HTTP-Alt"),
    (8443, "HTTPS-Alt"),
    (9000, "PHP-FPM/Sonar"),
    (27017, "MongoDB"),
];

/// Command-name keywords in priority order. Labels are mutually exclusive,
/// so the order decides ties such as `mongod` (contains `go`).
pub const COMMAND_KEYWORDS: &[(&[&str], &str)] = &[
    (&["node"], "Node.js"),
    (&["python"], "Python"),
    (&["java"], "Java"),
    (&["go"], "Go"),
    (&["ruby"], "Ruby"),
    (&["php"], "PHP"),
    (&["postgres"], "PostgreSQL"),
    (&["mysql"], "MySQL"),
    (&["redis"], "Redis"),
    (&["nginx"], "Nginx"),
    (&["apache"], "Apache"),
    (&["docker"], "Docker"),
    (&["code"], "VS Code"),
    (&["chrome", "firefox"], "Browser"),
];

/// Port-range heuristic, used when neither the port nor the command is known.
pub const PORT_RANGES: &[(u16, u16, &str)] = &[
    (3000, 3999, "Development"),
    (8000, 8999, "Development"),
    (9000, 9999, "Development"),
    (1, 1023, "System"),
];

/// Predicate half of a classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Exact port number.
    Port(u16),
    /// Case-insensitive substring of the command name (any keyword).
    CommandContains(&'static [&'static str]),
    /// Inclusive port range.
    PortRange(u16, u16),
}

impl Matcher {
    /// Evaluate against a port and an already lowercased command.
    pub fn matches(&self, port: u16, command_lower: &str) -> bool {
        match *self {
            Matcher::Port(p) => p == port,
            Matcher::CommandContains(keywords) => keywords.iter().any(|k| command_lower.contains(k)),
            Matcher::PortRange(start, end) => (start..=end).contains(&port),
        }
    }
}

/// The full ordered rule list: well-known ports, then command keywords,
/// then port ranges.
pub fn rules() -> impl Iterator<Item = (Matcher, &'static str)> {
    let ports = WELL_KNOWN_PORTS
        .iter()
        .map(|&(port, label)| (Matcher::Port(port), label));
    let commands = COMMAND_KEYWORDS
        .iter()
        .map(|&(keywords, label)| (Matcher::CommandContains(keywords), label));
    let ranges = PORT_RANGES
        .iter()
        .map(|&(start, end, label)| (Matcher::PortRange(start, end), label));

    ports.chain(commands).chain(ranges)
}

/// Classify a port/command pair into a human-readable service label.
///
/// Never returns an empty string.
pub fn classify(port: u16, command: &str) -> &'static str {
    let command = command.to_lowercase();
    rules()
        .find(|(matcher, _)| matcher.matches(port, &command))
        .map(|(_, label)| label)
        .unwrap_or(UNKNOWN)
}

/// Label for a well-known port only, without heuristics.
pub fn well_known(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, label)| *label)
}

/// What a free port is conventionally used for.
pub fn suggested_use(port: u16) -> &'static str {
    match port {
        3000..=3999 => "React/Node.js dev",
        4000..=4999 => "Development server",
        5000..=5999 => "Flask/Python dev",
        8000..=8999 => "HTTP development",
        9000..=9999 => "Development tools",
        _ => "General purpose",
    }
}
