//! Pattern catalog used by the query analyzer
//!
//! Every pattern runs against the lowercased query and against its folded
//! form (NFKD, combining marks stripped), so umlaut spellings, `oe`
//! transliterations and plain vowels all land on the same entry.

use std::sync::LazyLock;

use regex::Regex;

/// A regex with a stable identifier reported in `matched_patterns`
pub(crate) struct NamedPattern {
    pub id: &'static str,
    pub re: Regex,
}

impl NamedPattern {
    pub fn matches(&self, lower: &str, folded: &str) -> bool {
        self.re.is_match(lower) || self.re.is_match(folded)
    }
}

fn compile(table: &[(&'static str, &str)]) -> Vec<NamedPattern> {
    table
        .iter()
        .map(|(id, pattern)| NamedPattern {
            id,
            re: Regex::new(pattern).expect("must be valid regex"),
        })
        .collect()
}

/// Whole-word alternation over a keyword list
pub(crate) fn keyword_regex<S: AsRef<str>>(words: &[S]) -> Option<Regex> {
    if words.is_empty() {
        return None;
    }

    let alternation = words
        .iter()
        .map(|w| regex::escape(&w.as_ref().to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");

    Regex::new(&format!(r"\b(?:{alternation})\b")).ok()
}

// Umlaut-tolerant fragments: "ö", "oe" and the folded "o" all match
const OE: &str = "(?:ö|oe|o)";
const SZ: &str = "(?:ß|ss)";

/// "Which command shows ..." style questions that a small model answers well
pub(crate) static BASIC_COMMAND: LazyLock<Vec<NamedPattern>> = LazyLock::new(|| {
    compile(&[
        (
            "fast.which_command",
            r"\bwelche[rs]?\s+(?:befehl|kommando)\s+(?:zeigt|anzeigt|macht|gibt|listet)\b",
        ),
        (
            "fast.what_does_command",
            r"\bwas\s+macht\s+(?:der|das|die)\s+[\w.-]+\s+(?:befehl|kommando)\b",
        ),
        (
            "fast.how_do_i_show",
            r"\bwie\s+(?:(?:zeige|liste)\s+ich\b|kann\s+ich\b.{0,40}\b(?:anzeigen|auflisten|sehen)\b)",
        ),
        (
            "fast.which_command_en",
            r"\b(?:which\s+command\s+(?:shows|lists|displays|prints)|what\s+does\s+(?:the\s+)?[\w.-]+\s+command\s+do)\b",
        ),
        (
            "fast.bare_command",
            r"^\s*(?:ls|ll|pwd|df|du|ps|top|htop|free|uname|uptime|whoami|lsblk)(?:\s+-{1,2}[\w-]+)*\s*\??\s*$",
        ),
    ])
});

/// Mathematical and optimization intent
pub(crate) static MATH: LazyLock<Vec<NamedPattern>> = LazyLock::new(|| {
    let verbs = format!(r"(?:bestimme|berechne|ermittle|minimiere|maximiere|optimiere|finde|l{OE}se|solve)");
    let size = format!(r"gr{OE}{SZ}e");

    compile(&[
        ("math.equation", r"\b(?:gleichung\w*|equation\w*)"),
        ("math.expression", r"\b[xyz]\s*[-+*/]\s*[xyz]\b"),
        ("math.variable_value", r"\b[xyz]\d*\s*[=<>]\s*-?\d+"),
        ("math.numeric_relation", r"\b\d+\s*[=<>]\s*\d+\b"),
        (
            "math.number_domain",
            &format!(r"\b(?:ganze\s+zahlen|integer\w*|nat{}rliche\s+zahlen|primzahl\w*)\b", "(?:ü|ue|u)"),
        ),
        ("math.condition", &format!(r"\b(?:bedingung\w*|nebenbedingung\w*|erf{}ll\w*)\b", "(?:ü|ue|u)")),
        (
            "math.topic",
            r"\b(?:mathe|mathematik|mathematics|rechnen|integral\w*|ableitung\w*|matrix|matrizen|eigenwert\w*|polynom\w*|wahrscheinlichkeit\w*)\b",
        ),
        ("math.fibonacci", r"\bfibonacci\w*"),
        ("math.solution", &format!(r"\b(?:l{OE}sung\w*|solution\w*|werte\s+haben)\b")),
        ("math.mathematically_optimal", r"\bmathematisch\w*\b.{0,40}\boptimal\w*"),
        (
            "math.verb_optimum",
            &format!(r"\b{verbs}\b[^.]{{0,80}}\b(?:optimal\w*|minimum|minimal\w*|maxim\w*|argmin|argmax)"),
        ),
        ("math.verb_system", &format!(r"\b{verbs}\b.{{0,40}}\b(?:gleichung\w*|system\w*)")),
        (
            "math.buffer_io",
            &format!(r"\b(?:puffer|block){size}\b.{{0,40}}\b(?:operation\w*|i/?o)\b"),
        ),
        ("math.optimization_task", r"\boptimierungs(?:aufgabe|problem)\w*"),
        (
            "math.optimal_quantity",
            &format!(r"\boptimalen?\s+(?:anzahl|{size}|(?:batch|cache|puffer|block)[-\s]?{size}|timeouts?|verteilung)"),
        ),
        ("math.symbols", r"[∫∑∏√π∞≤≥≠≈]|\^\d"),
        (
            "math.resource_calc",
            &format!(r"\b(?:berechne|bestimme|ermittle)\b.*\b(?:anzahl|{size}|wert\w*|intervall\w*)"),
        ),
    ])
});

/// Technical and operational vocabulary beyond single keywords
pub(crate) static TECH: LazyLock<Vec<NamedPattern>> = LazyLock::new(|| {
    compile(&[
        ("tech.io_operation", r"\b(?:i/?o|io)[\s/\-–—]*operation\w*"),
        (
            "tech.throughput",
            r"\b(?:buffer|puffer|blocksize|durchsatz|throughput|syscall\w*|latenz|latency)\b",
        ),
        ("tech.pipe", r"\|\s*(?:grep|awk|sed|sort|uniq|head|tail|wc|xargs|less)\b"),
        ("tech.flag", r"(?:^|\s)--?[a-z][\w-]*"),
        ("tech.path", r"(?:^|\s)(?:/|~/)[\w.-]+"),
        (
            "tech.system_concept",
            r"\b(?:dateisystem\w*|filesystem\w*|speicherverwaltung|kernel\w*|prozess\w*|container\w*|lxc|load[-\s]?balanc\w*|performance\w*|cpu[-\s]?(?:last|auslastung)|netzwerk\w*|datenbank\w*)\b",
        ),
    ])
});

/// Verbs that ask for a calculation or optimization
pub(crate) static CALCULATION_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:bestimme|berechne|ermittle|minimiere|maximiere|optimiere|finde|l{OE}se|beweise|compute|calculate|minimi[sz]e|maximi[sz]e|optimi[sz]e|solve|prove)\b"
    ))
    .expect("must be valid regex")
});

/// Multi-step, analysis and problem-solving phrases
pub(crate) static COMPLEXITY_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:schritt\s+f(?:ü|ue|u)r\s+schritt|step\s+by\s+step|anleitung|tutorial|walkthrough|analysiere|analy[sz]e|untersuche|examine|erkl(?:ä|ae|a)re\s+detailliert|explain\s+in\s+detail|vergleiche|compare|bewerte|evaluate|l{OE}se|solve|behebe|troubleshoot|diagnose|optimiere|optimi[sz]e|berechne|calculate|compute|formel|formula|algorithmus|algorithm|komplexit(?:ä|ae|a)t)\b"
    ))
    .expect("must be valid regex")
});

/// Shell and system administration words
pub(crate) const LINUX_KEYWORDS: &[&str] = &[
    "befehl", "kommando", "command", "bash", "shell", "terminal", "konsole", "linux", "systemctl", "service", "daemon",
    "grep", "awk", "sed", "find", "chmod", "chown", "mount", "umount", "df", "du", "lsblk", "fdisk", "ps", "top",
    "htop", "kill", "killall", "nohup", "tmux", "ssh", "scp", "rsync", "wget", "curl", "netstat", "iptables",
    "firewall", "ping", "traceroute", "tar", "gzip", "cron", "crontab", "systemd", "journalctl", "dmesg", "syslog",
    "docker", "kubernetes", "apt", "dnf", "yum", "pacman", "snap", "vim", "nano", "backup", "festplatte",
];

/// Programming words
pub(crate) const CODE_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "java", "rust", "php", "ruby", "perl", "html", "css", "sql", "json", "xml",
    "yaml", "git", "github", "commit", "merge", "branch", "debug", "debuggen", "exception", "traceback", "compile",
    "compiler", "cmake", "pytest", "unittest", "deploy", "deployment", "api", "regex", "funktion", "function",
    "klasse", "class", "methode", "method", "skript", "script", "programm", "programmiere", "code", "coding",
    "algorithmus", "algorithm", "parser", "bug",
];
