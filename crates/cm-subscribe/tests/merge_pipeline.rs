// End-to-end: raw source payloads -> merged records -> rendered document.
use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cm_subscribe::aggregate::{merge_sources, EnvelopeState, FetchedSource};
use cm_subscribe::assemble::{ConfigAssembler, AUTO_GROUP, FALLBACK_GROUP, MANUAL_GROUP};
use cm_subscribe::classify::Format;
use cm_subscribe::model::{ProtocolType, SubsError};
use cm_subscribe::parse_clash;

const DOC: &str = r#"
port: 7890
allow-lan: false
proxies:
  - {name: hk-1, type: ss, server: hk.example.com, port: 8388, cipher: aes-128-gcm, password: p1}
  - name: jp-1
    type: vmess
    server: jp.example.com
    port: 443
    uuid: 0b4a2e5c-0000-4000-8000-000000000001
    alterId: 0
    cipher: auto
    network: ws
    ws-opts: {path: /v, headers: {Host: cdn.example.com}}
  - {name: us-1, type: trojan, server: us.example.com, port: 443, password: p3, sni: us.example.com, skip-cert-verify: true}
  - '{"name":"sg-1","type":"vless","server":"sg.example.com","port":443,"uuid":"u4","flow":"xtls-rprx-vision"}'
rules:
  - MATCH,DIRECT
"#;

const LINKS: &str = "\
trojan://secret@host.example:443?sni=a.example#MyNode
ss://aes-256-gcm:pw123@host:8388
hysteria2://pass@hy.example.com:8443/?insecure=1&mport=20000-30000#Hy
";

#[test]
fn structured_document_yields_every_entry_in_order() -> Result<()> {
    let entries = parse_clash::extract(DOC)?;
    assert_eq!(entries.len(), 4);
    let names: Vec<String> = entries
        .into_iter()
        .map(|e| e.result.map(|r| r.name))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, ["hk-1", "jp-1", "us-1", "sg-1"]);
    Ok(())
}

#[test]
fn base64_envelope_is_transparent() -> Result<()> {
    for payload in [DOC, LINKS] {
        let plain = merge_sources([&FetchedSource::ok("plain", payload)])?;
        let wrapped = merge_sources([&FetchedSource::ok("wrapped", STANDARD.encode(payload))])?;
        assert_eq!(plain.records, wrapped.records);
        assert_eq!(plain.report.sources[0].envelope, EnvelopeState::None);
        assert_eq!(wrapped.report.sources[0].envelope, EnvelopeState::Decoded);
    }
    Ok(())
}

#[test]
fn share_link_examples() -> Result<()> {
    let merged = merge_sources([&FetchedSource::ok("links", LINKS)])?;
    let [trojan, ss, hy] = merged.records.as_slice() else {
        panic!("expected three records, got {}", merged.records.len());
    };
    assert_eq!(trojan.name, "MyNode");
    assert_eq!(trojan.protocol, ProtocolType::Trojan);
    assert_eq!((trojan.server.as_str(), trojan.port), ("host.example", 443));
    assert_eq!(trojan.options.password.as_deref(), Some("secret"));
    assert_eq!(trojan.options.sni.as_deref(), Some("a.example"));

    assert_eq!(ss.name, "Proxy_2");
    assert_eq!(ss.options.method.as_deref(), Some("aes-256-gcm"));
    assert_eq!(ss.options.password.as_deref(), Some("pw123"));

    assert_eq!(hy.protocol, ProtocolType::Hysteria2);
    assert_eq!(hy.options.skip_cert_verify, Some(true));
    assert_eq!(hy.options.udp, Some(true));
    assert_eq!(hy.options.mport.as_deref(), Some("20000-30000"));
    Ok(())
}

#[test]
fn vmess_payload_example() -> Result<()> {
    let payload = STANDARD.encode(r#"{"add":"h","port":"443","id":"u","aid":2,"net":"ws"}"#);
    let merged = merge_sources([&FetchedSource::ok("vm", format!("vmess://{payload}\n"))])?;
    let r = &merged.records[0];
    assert_eq!(r.protocol, ProtocolType::Vmess);
    assert_eq!((r.server.as_str(), r.port), ("h", 443));
    assert_eq!(r.options.uuid.as_deref(), Some("u"));
    assert_eq!(r.options.alter_id, Some(2));
    assert_eq!(r.options.network.as_deref(), Some("ws"));
    Ok(())
}

#[test]
fn portless_link_drops_exactly_one_record() -> Result<()> {
    let broken = LINKS.replace("ss://aes-256-gcm:pw123@host:8388", "ss://aes-256-gcm:pw123@host?plugin=x");
    let good = merge_sources([&FetchedSource::ok("a", LINKS)])?;
    let bad = merge_sources([&FetchedSource::ok("a", broken)])?;
    assert_eq!(bad.records.len(), good.records.len() - 1);
    assert_eq!(bad.records[0], good.records[0]);
    assert_eq!(bad.records[1].name, good.records[2].name);
    assert_eq!(bad.report.skipped, 1);
    assert_eq!(bad.report.sources[0].skipped[0].position, 2);
    Ok(())
}

#[test]
fn mixed_sources_keep_configured_order() -> Result<()> {
    let sources = [
        FetchedSource::ok("links.txt", LINKS),
        FetchedSource::failed("down.yaml"),
        FetchedSource::ok("junk.txt", "<html>blocked</html>"),
        FetchedSource::ok("doc.yaml", DOC),
    ];
    let merged = merge_sources(&sources)?;
    assert_eq!(merged.records.len(), 7);
    assert_eq!(merged.records[3].name, "hk-1");
    let formats: Vec<_> = merged.report.sources.iter().map(|s| s.format).collect();
    assert_eq!(
        formats,
        [Some(Format::ShareLinks), None, Some(Format::Ambiguous), Some(Format::Structured)]
    );
    Ok(())
}

#[test]
fn manual_group_lists_auto_fallback_then_proxies() -> Result<()> {
    let merged = merge_sources([&FetchedSource::ok("a", "trojan://p@a:1#A\ntrojan://p@b:1#B\n")])?;
    let doc = ConfigAssembler::builtin().assemble(merged.records)?;
    assert_eq!(doc.groups[0].name, MANUAL_GROUP);
    assert_eq!(doc.groups[0].proxies, [AUTO_GROUP, FALLBACK_GROUP, "A", "B"]);
    let text = doc.render()?;
    assert_eq!(text.lines().last(), Some("  - 'MATCH,手动选择'"));
    Ok(())
}

#[test]
fn zero_records_is_fatal() {
    let err = merge_sources([&FetchedSource::ok("a", "# only comments\ntrojan://x\n")]).unwrap_err();
    assert_eq!(err, SubsError::EmptyAggregate);
}
