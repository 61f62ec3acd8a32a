use crate::helpers::ip::Address;

pub fn addr(input: &str) -> Address {
    input.parse().expect(input)
}

/// Builds one line of yarrp text output with the given fields of interest,
/// filling everything else with plausible values.
pub fn yarrp_line(target: &str, icmp_type: u8, sent_ttl: i64, from: &str) -> String {
    yarrp_line_with(' ', target, icmp_type, sent_ttl, from)
}

pub fn yarrp_line_with(
    delimiter: char,
    target: &str,
    icmp_type: u8,
    sent_ttl: i64,
    from: &str,
) -> String {
    let fields = [
        target.to_string(),
        "1650218570".to_string(),
        "935332".to_string(),
        icmp_type.to_string(),
        "0".to_string(),
        sent_ttl.to_string(),
        from.to_string(),
        "211626".to_string(),
        "21085".to_string(),
        "40".to_string(),
        "96".to_string(),
        "245".to_string(),
        "0".to_string(),
        "24226:1".to_string(),
        "239158637".to_string(),
    ];
    fields.join(&delimiter.to_string())
}
