//! String formatting utilities for log output and hex handling.

/// Truncates a hex string for log display.
///
/// Keeps the first 10 characters (`0x` plus four bytes) followed by "..".
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Adds a "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes a "0x"/"0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0x1234"), "0x1234");
		assert_eq!(
			truncate_id("0xabcdef0123456789abcdef0123456789abcdef01"),
			"0xabcdef01.."
		);
	}

	#[test]
	fn test_prefix_helpers() {
		assert_eq!(with_0x_prefix("dead"), "0xdead");
		assert_eq!(with_0x_prefix("0Xdead"), "0Xdead");
		assert_eq!(without_0x_prefix("0xbeef"), "beef");
		assert_eq!(without_0x_prefix("beef"), "beef");
	}
}
