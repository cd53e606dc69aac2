//! Builds the merged client document: base settings, DNS, proxy groups,
//! proxies and the rule table.
//! [Chinese] 组装最终配置：基础设置、DNS、代理组、代理列表与规则表。
//!
//!   - Base settings and rules are immutable values created once and borrowed.
//!   - [Chinese] 基础设置与规则表只创建一次，以只读引用传入。
use crate::model::{GroupType, ProxyGroup, ProxyRecord, SubsError};
use crate::rules::{builtin_rules, RuleEntry};
use once_cell::sync::Lazy;

pub const MANUAL_GROUP: &str = "手动选择";
pub const AUTO_GROUP: &str = "自动选择";
pub const FALLBACK_GROUP: &str = "故障转移";
pub const TEST_URL: &str = "http://www.gstatic.com/generate_204";
const AUTO_INTERVAL_SECS: u32 = 86400;
const FALLBACK_INTERVAL_SECS: u32 = 7200;

/// Average rendered line length, used to size the output buffer.
const ESTIMATED_LINE_LENGTH: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSettings {
    pub enable: bool,
    pub ipv6: bool,
    pub default_nameserver: Vec<String>,
    pub enhanced_mode: String,
    pub fake_ip_range: String,
    pub use_hosts: bool,
    pub nameserver: Vec<String>,
    pub fallback: Vec<String>,
    pub fallback_filter_geoip: bool,
    pub fallback_filter_ipcidr: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSettings {
    pub mixed_port: u16,
    pub allow_lan: bool,
    pub bind_address: String,
    pub mode: String,
    pub log_level: String,
    pub external_controller: String,
    pub dns: DnsSettings,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

impl Default for BaseSettings {
    fn default() -> Self {
        Self {
            mixed_port: 7890,
            allow_lan: true,
            bind_address: "*".into(),
            mode: "rule".into(),
            log_level: "info".into(),
            external_controller: "127.0.0.1:9090".into(),
            dns: DnsSettings {
                enable: true,
                ipv6: false,
                default_nameserver: strings(&["223.5.5.5", "119.29.29.29"]),
                enhanced_mode: "fake-ip".into(),
                fake_ip_range: "198.18.0.1/16".into(),
                use_hosts: true,
                nameserver: strings(&["https://doh.pub/dns-query", "https://dns.alidns.com/dns-query"]),
                fallback: strings(&[
                    "https://doh.dns.sb/dns-query",
                    "https://dns.cloudflare.com/dns-query",
                    "https://dns.twnic.tw/dns-query",
                    "tls://8.8.4.4:853",
                ]),
                fallback_filter_geoip: true,
                fallback_filter_ipcidr: strings(&["240.0.0.0/4", "0.0.0.0/32"]),
            },
        }
    }
}

static BASE_SETTINGS: Lazy<BaseSettings> = Lazy::new(BaseSettings::default);

/// Process-wide base settings template.
pub fn base_settings() -> &'static BaseSettings {
    &BASE_SETTINGS
}

/// The three fixed groups over `names`, duplicates included.
pub fn build_groups(names: &[String]) -> Vec<ProxyGroup> {
    let manual = [AUTO_GROUP.to_string(), FALLBACK_GROUP.to_string()]
        .into_iter()
        .chain(names.iter().cloned())
        .collect();
    vec![
        ProxyGroup {
            name: MANUAL_GROUP.into(),
            group_type: GroupType::Select,
            proxies: manual,
            url: None,
            interval: None,
        },
        ProxyGroup {
            name: AUTO_GROUP.into(),
            group_type: GroupType::UrlTest,
            proxies: names.to_vec(),
            url: Some(TEST_URL.into()),
            interval: Some(AUTO_INTERVAL_SECS),
        },
        ProxyGroup {
            name: FALLBACK_GROUP.into(),
            group_type: GroupType::Fallback,
            proxies: names.to_vec(),
            url: Some(TEST_URL.into()),
            interval: Some(FALLBACK_INTERVAL_SECS),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct MergedDocument<'a> {
    pub base: &'a BaseSettings,
    pub groups: Vec<ProxyGroup>,
    pub proxies: Vec<ProxyRecord>,
    /// Fixed table followed by exactly one `MATCH` rule.
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigAssembler<'a> {
    base: &'a BaseSettings,
    rules: &'a [RuleEntry],
}

impl ConfigAssembler<'static> {
    pub fn builtin() -> Self {
        Self::new(base_settings(), builtin_rules())
    }
}

impl<'a> ConfigAssembler<'a> {
    pub fn new(base: &'a BaseSettings, rules: &'a [RuleEntry]) -> Self {
        Self { base, rules }
    }

    /// Pipeline: names -> groups -> rules + catch-all.
    /// [Chinese] 流程：名称 -> 代理组 -> 规则 + 兜底规则。
    pub fn assemble(&self, proxies: Vec<ProxyRecord>) -> Result<MergedDocument<'a>, SubsError> {
        if proxies.is_empty() {
            return Err(SubsError::EmptyAggregate);
        }
        let names: Vec<String> = proxies.iter().map(|p| p.name.clone()).collect();
        let groups = build_groups(&names);
        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        rules.extend_from_slice(self.rules);
        rules.push(RuleEntry::catch_all(MANUAL_GROUP));
        tracing::debug!(proxies = proxies.len(), rules = rules.len(), "document assembled");
        Ok(MergedDocument {
            base: self.base,
            groups,
            proxies,
            rules,
        })
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn flow_list(items: &[String]) -> String {
    let inner: Vec<String> = items.iter().map(|s| quote(s)).collect();
    format!("[{}]", inner.join(", "))
}

fn compact<T: serde::Serialize>(v: &T) -> Result<String, SubsError> {
    serde_json::to_string(v).map_err(|e| SubsError::RecordParse(e.to_string()))
}

impl MergedDocument<'_> {
    /// Render to document text. Groups and proxies are one compact JSON
    /// mapping per line; rules are single-quoted scalars.
    pub fn render(&self) -> Result<String, SubsError> {
        let line_count = 24 + self.groups.len() + self.proxies.len() + self.rules.len();
        let mut lines: Vec<String> = Vec::with_capacity(line_count);
        let b = self.base;
        let d = &b.dns;

        // 1) Base settings
        // [Chinese] 1) 基础设置
        lines.push(format!("mixed-port: {}", b.mixed_port));
        lines.push(format!("allow-lan: {}", b.allow_lan));
        lines.push(format!("bind-address: {}", quote(&b.bind_address)));
        lines.push(format!("mode: {}", quote(&b.mode)));
        lines.push(format!("log-level: {}", quote(&b.log_level)));
        lines.push(format!("external-controller: {}", quote(&b.external_controller)));

        // 2) DNS
        lines.push("dns:".into());
        lines.push(format!("    enable: {}", d.enable));
        lines.push(format!("    ipv6: {}", d.ipv6));
        lines.push(format!("    default-nameserver: {}", flow_list(&d.default_nameserver)));
        lines.push(format!("    enhanced-mode: {}", quote(&d.enhanced_mode)));
        lines.push(format!("    fake-ip-range: {}", quote(&d.fake_ip_range)));
        lines.push(format!("    use-hosts: {}", d.use_hosts));
        lines.push(format!("    nameserver: {}", flow_list(&d.nameserver)));
        lines.push(format!("    fallback: {}", flow_list(&d.fallback)));
        lines.push(format!(
            "    fallback-filter: {{ geoip: {}, ipcidr: {} }}",
            d.fallback_filter_geoip,
            flow_list(&d.fallback_filter_ipcidr)
        ));

        // 3) Groups, proxies
        // [Chinese] 3) 代理组与代理
        lines.push("proxy-groups:".into());
        for g in &self.groups {
            lines.push(format!("  - {}", compact(g)?));
        }
        lines.push("proxies:".into());
        for p in &self.proxies {
            lines.push(format!("  - {}", p.to_compact_line()?));
        }

        // 4) Rules, catch-all last
        // [Chinese] 4) 规则，兜底规则在最后
        lines.push("rules:".into());
        for r in &self.rules {
            lines.push(format!("  - {}", quote(&r.to_string())));
        }

        let mut out = String::with_capacity(lines.len() * ESTIMATED_LINE_LENGTH);
        for l in lines {
            out.push_str(&l);
            out.push('\n');
        }
        Ok(out)
    }
}
