//! Package version ordering and range membership.
//!
//! Versions are compared segment by segment: the string is split on `.` and
//! `-`, each piece into runs of digits and non-digits. Digit runs compare
//! numerically, other runs as strings, a digit run sorts after a non-digit
//! run and a shorter prefix sorts first (`1.0 < 1.0.0 < 1.0.1`).
//!
//! Range checks fail closed: a malformed package version is never inside a
//! range, while a malformed bound is ignored (that side becomes unbounded).

use std::cmp::Ordering;
use std::fmt;

use log::debug;

use crate::error::VersionParseError;

#[derive(Clone, Debug)]
enum Token {
	Alpha(String),
	/// Digits with leading zeros removed.
	Num(String),
}

impl Token {
	fn cmp_token(&self, other: &Token) -> Ordering {
		match (self, other) {
			(Token::Num(a), Token::Num(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
			(Token::Alpha(a), Token::Alpha(b)) => a.cmp(b),
			(Token::Alpha(_), Token::Num(_)) => Ordering::Less,
			(Token::Num(_), Token::Alpha(_)) => Ordering::Greater,
		}
	}
}

fn tokenize(s: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	for piece in s.split(['.', '-']) {
		let mut run = String::new();
		let mut run_is_digit = false;
		for ch in piece.chars() {
			let is_digit = ch.is_ascii_digit();
			if !run.is_empty() && is_digit != run_is_digit {
				tokens.push(finish_run(std::mem::take(&mut run), run_is_digit));
			}
			run_is_digit = is_digit;
			run.push(ch);
		}
		if !run.is_empty() {
			tokens.push(finish_run(run, run_is_digit));
		}
	}
	tokens
}

fn finish_run(run: String, is_digit: bool) -> Token {
	if is_digit {
		Token::Num(run.trim_start_matches('0').to_owned())
	} else {
		Token::Alpha(run)
	}
}

fn cmp_tokens(a: &[Token], b: &[Token]) -> Ordering {
	for (x, y) in a.iter().zip(b) {
		let ord = x.cmp_token(y);
		if ord != Ordering::Equal {
			return ord;
		}
	}
	a.len().cmp(&b.len())
}

/// A validated version string.
#[derive(Clone, Debug)]
pub struct Version {
	raw: String,
	tokens: Vec<Token>,
}

impl Version {
	/// Validate and tokenize `s`.
	pub fn parse(s: &str) -> Result<Self, VersionParseError> {
		let Some(first) = s.chars().next() else {
			return Err(VersionParseError::Empty);
		};
		if s.trim().is_empty() {
			return Err(VersionParseError::Empty);
		}
		if !first.is_ascii_digit() {
			return Err(VersionParseError::LeadingNonDigit(s.to_owned()));
		}
		if let Some(ch) = s
			.chars()
			.find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
		{
			return Err(VersionParseError::InvalidChar {
				version: s.to_owned(),
				ch,
			});
		}
		Ok(Self {
			raw: s.to_owned(),
			tokens: tokenize(s),
		})
	}

	/// The string this version was parsed from.
	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl Ord for Version {
	fn cmp(&self, other: &Self) -> Ordering {
		cmp_tokens(&self.tokens, &other.tokens)
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Version {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Version {}

/// Compare two version strings segment by segment.
///
/// Works on any input, valid or not; use [`is_valid`] to gate.
pub fn compare(a: &str, b: &str) -> Ordering {
	cmp_tokens(&tokenize(a), &tokenize(b))
}

/// `true` if `v` starts with a digit and contains only alphanumerics, `.` and `-`.
pub fn is_valid(v: &str) -> bool {
	Version::parse(v).is_ok()
}

/// Whether `version` lies inside the inclusive interval `[min, max]`.
pub fn in_range(version: Option<&str>, min: Option<&str>, max: Option<&str>) -> bool {
	let version = match version.map(Version::parse) {
		Some(Ok(v)) => v,
		Some(Err(err)) => {
			debug!("excluding unparsable package version: {err}");
			return false;
		}
		None => return false,
	};

	let bound = |b: Option<&str>| match b.map(Version::parse) {
		Some(Ok(v)) => Some(v),
		Some(Err(err)) => {
			debug!("ignoring unparsable range bound: {err}");
			None
		}
		None => None,
	};

	if let Some(min) = bound(min)
		&& version < min
	{
		return false;
	}
	if let Some(max) = bound(max)
		&& version > max
	{
		return false;
	}
	true
}
