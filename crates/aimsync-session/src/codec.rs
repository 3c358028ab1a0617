//! Stateless encoders and decoders for the pairing protocol
//!
//! QR payload strings, the sync URL, POSIX TZ derivation, window arithmetic,
//! and the flat-JSON field scanners used by the `/time/set` handler.
//!
//! The JSON scanners are a deliberately narrow single-pass parser (flat
//! object, numeric and string leaves only). The request body is one fixed
//! three-field object produced by our own sync page, so a general JSON
//! library would buy nothing here; this mirrors the code-size trade-off the
//! device firmware makes.

/// Escape a Wi-Fi QR field: `\`, `;`, `,`, `:` each get one leading backslash.
fn escape_wifi_field(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        if matches!(c, '\\' | ';' | ',' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the Wi-Fi join QR payload (QR #1):
/// `WIFI:T:WPA;S:<ssid>;P:<psk>;H:false;;`
pub fn build_wifi_qr_payload(ssid: &str, psk: &str) -> String {
    format!(
        "WIFI:T:WPA;S:{};P:{};H:false;;",
        escape_wifi_field(ssid),
        escape_wifi_field(psk)
    )
}

/// Build the post-join sync URL (QR #2): `http://<ip>/sync?t=<token>`
pub fn build_url(ip: &str, token: &str) -> String {
    format!("http://{}/sync?t={}", ip, token)
}

/// Format a timezone offset as sign + zero-padded HHMM, e.g. 540 → `+0900`
pub fn format_offset_hhmm(tz_offset_min: i32) -> String {
    let sign = if tz_offset_min >= 0 { '+' } else { '-' };
    let m = tz_offset_min.abs();
    format!("{}{:02}{:02}", sign, m / 60, m % 60)
}

/// Derive a POSIX TZ string from an east-positive offset in minutes.
///
/// POSIX reverses the sign convention: UTC+9 is `GMT-9`, UTC-5:30 is
/// `GMT+5:30`. Zero is the POSIX-conformant `GMT0`. The `GMT` abbreviation is
/// kept because newlib on the device rejects abbreviations shorter than three
/// characters.
pub fn build_posix_tz_from_offset_minutes(tz_offset_min: i32) -> String {
    if tz_offset_min == 0 {
        return "GMT0".to_string();
    }
    let sign = if tz_offset_min > 0 { '-' } else { '+' };
    let m = tz_offset_min.abs();
    let (hours, mins) = (m / 60, m % 60);
    if mins == 0 {
        format!("GMT{}{}", sign, hours)
    } else {
        format!("GMT{}{}:{:02}", sign, hours, mins)
    }
}

/// Exact token comparison. Constant-time comparison is not required given the
/// resource envelope: one attempt per 60-second window.
pub fn verify_token(expected: &str, actual: &str) -> bool {
    expected == actual
}

/// True iff `now_ms - start_ms` (wrapping u32 arithmetic) is within the window.
pub fn is_within_window(start_ms: u32, now_ms: u32, window_ms: u32) -> bool {
    now_ms.wrapping_sub(start_ms) <= window_ms
}

/// Locate `"key"` in a flat JSON object and return the raw value slice that
/// follows the colon: the quoted contents for strings, the trimmed literal
/// for numbers.
fn json_extract_raw<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{}\"", key);
    let key_pos = body.find(&needle)?;
    let rest = &body[key_pos + needle.len()..];
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?;
    let rest = rest.trim_start();
    if let Some(inner) = rest.strip_prefix('"') {
        let end = inner.find('"')?;
        Some(&inner[..end])
    } else {
        let end = rest
            .find(|c: char| c == ',' || c == '}')
            .unwrap_or(rest.len());
        let value = rest[..end].trim();
        (!value.is_empty()).then_some(value)
    }
}

/// Extract a string field. `None` if the key is absent or the value is not a
/// quoted string.
pub fn json_extract_string(body: &str, key: &str) -> Option<String> {
    let needle = format!("\"{}\"", key);
    let key_pos = body.find(&needle)?;
    let rest = body[key_pos + needle.len()..].trim_start().strip_prefix(':')?;
    let inner = rest.trim_start().strip_prefix('"')?;
    let end = inner.find('"')?;
    Some(inner[..end].to_string())
}

/// Extract an i64 numeric field. `None` on absence or a malformed literal.
pub fn json_extract_i64(body: &str, key: &str) -> Option<i64> {
    json_extract_raw(body, key)?.parse::<i64>().ok()
}

/// Extract an i32 numeric field. `None` on absence, malformed literal, or
/// overflow.
pub fn json_extract_i32(body: &str, key: &str) -> Option<i32> {
    i32::try_from(json_extract_i64(body, key)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_payload_plain_fields_pass_through() {
        let payload = build_wifi_qr_payload("AIM-TS-0badf00d", "74f1a2b3c4d5e6f7");
        assert_eq!(
            payload,
            "WIFI:T:WPA;S:AIM-TS-0badf00d;P:74f1a2b3c4d5e6f7;H:false;;"
        );
    }

    #[test]
    fn wifi_payload_escapes_specials_with_one_backslash() {
        let payload = build_wifi_qr_payload(r"a;b", r"c:d,e\f");
        assert_eq!(payload, r"WIFI:T:WPA;S:a\;b;P:c\:d\,e\\f;H:false;;");
    }

    #[test]
    fn url_embeds_ip_and_token() {
        assert_eq!(
            build_url("192.168.4.1", "74f1a2b3c4d5e6f7"),
            "http://192.168.4.1/sync?t=74f1a2b3c4d5e6f7"
        );
    }

    #[test]
    fn offset_hhmm_formatting() {
        assert_eq!(format_offset_hhmm(540), "+0900");
        assert_eq!(format_offset_hhmm(-330), "-0530");
        assert_eq!(format_offset_hhmm(0), "+0000");
        assert_eq!(format_offset_hhmm(45), "+0045");
    }

    #[test]
    fn posix_tz_reverses_sign_and_handles_zero() {
        assert_eq!(build_posix_tz_from_offset_minutes(540), "GMT-9");
        assert_eq!(build_posix_tz_from_offset_minutes(0), "GMT0");
        assert_eq!(build_posix_tz_from_offset_minutes(-300), "GMT+5");
        assert_eq!(build_posix_tz_from_offset_minutes(330), "GMT-5:30");
        assert_eq!(build_posix_tz_from_offset_minutes(-570), "GMT+9:30");
    }

    #[test]
    fn token_verification_is_exact() {
        assert!(verify_token("abc123", "abc123"));
        assert!(!verify_token("abc123", "abc124"));
        assert!(!verify_token("abc123", "abc1234"));
        assert!(!verify_token("abc123", ""));
    }

    #[test]
    fn window_check_counts_boundary_as_inside() {
        assert!(is_within_window(1_000, 1_000, 60_000));
        assert!(is_within_window(1_000, 61_000, 60_000));
        assert!(!is_within_window(1_000, 61_001, 60_000));
    }

    #[test]
    fn window_check_survives_u32_wraparound() {
        // start shortly before wrap, now shortly after
        assert!(is_within_window(u32::MAX - 5_000, 10_000, 60_000));
        assert!(!is_within_window(u32::MAX - 5_000, 120_000, 60_000));
    }

    #[test]
    fn json_extracts_the_sync_page_body() {
        let body = r#"{"epochMs":1735689601000,"tzOffsetMin":-540,"token":"74f1a2b3c4d5e6f7"}"#;
        assert_eq!(json_extract_i64(body, "epochMs"), Some(1_735_689_601_000));
        assert_eq!(json_extract_i32(body, "tzOffsetMin"), Some(-540));
        assert_eq!(
            json_extract_string(body, "token"),
            Some("74f1a2b3c4d5e6f7".to_string())
        );
    }

    #[test]
    fn json_tolerates_whitespace() {
        let body = "{ \"epochMs\" : 42 , \"token\" : \"tok\" }";
        assert_eq!(json_extract_i64(body, "epochMs"), Some(42));
        assert_eq!(json_extract_string(body, "token"), Some("tok".to_string()));
    }

    #[test]
    fn json_missing_key_is_none() {
        let body = r#"{"epochMs":42}"#;
        assert_eq!(json_extract_i64(body, "tzOffsetMin"), None);
        assert_eq!(json_extract_string(body, "token"), None);
    }

    #[test]
    fn json_malformed_number_is_none() {
        assert_eq!(json_extract_i64(r#"{"epochMs":12a4}"#, "epochMs"), None);
        assert_eq!(json_extract_i64(r#"{"epochMs":}"#, "epochMs"), None);
        assert_eq!(json_extract_i64(r#"{"epochMs""#, "epochMs"), None);
    }

    #[test]
    fn json_number_where_string_expected_is_none() {
        assert_eq!(json_extract_string(r#"{"token":42}"#, "token"), None);
    }

    #[test]
    fn json_i32_overflow_is_none() {
        assert_eq!(
            json_extract_i32(r#"{"tzOffsetMin":99999999999}"#, "tzOffsetMin"),
            None
        );
    }
}
