//! Token-level parsers: atoms, strings, literals, numbers, and the other
//! lexical building blocks the command grammar is assembled from.
//!
//! These all take the *complete* bytes of a logical command (literal
//! payloads already spliced in by the framing layer, see
//! [`crate::framing`]) and use `nom::bytes::complete`, not `streaming` —
//! by the time anything in this module runs, every byte it needs is
//! already in the buffer.

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{map, map_res, opt, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

use imap_types::core::{AString, Atom, IString, Literal, LiteralMode, NString, Quoted, Tag};

fn is_atom_char(b: u8) -> bool {
    !matches!(
        b,
        b'(' | b')' | b'{' | b' ' | 0..=0x1f | 0x7f | b'%' | b'*' | b'"' | b'\\' | b']'
    )
}

fn is_quoted_text_char(b: u8) -> bool {
    b != b'"' && b != b'\\' && b != b'\r' && b != b'\n'
}

pub(crate) fn sp(input: &[u8]) -> IResult<&[u8], ()> {
    value((), char(' '))(input)
}

pub(crate) fn crlf(input: &[u8]) -> IResult<&[u8], ()> {
    value((), tag("\r\n"))(input)
}

pub(crate) fn number(input: &[u8]) -> IResult<&[u8], u32> {
    map_res(digit1, |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .unwrap_or_default()
            .parse::<u32>()
    })(input)
}

pub(crate) fn number64(input: &[u8]) -> IResult<&[u8], u64> {
    map_res(digit1, |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .unwrap_or_default()
            .parse::<u64>()
    })(input)
}

/// `atom` — one or more atom-chars, matched case-preservingly.
pub(crate) fn atom(input: &[u8]) -> IResult<&[u8], Atom> {
    map_res(take_while1(is_atom_char), |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .map(Atom::unchecked)
            .map_err(|_| "atom is not valid UTF-8")
    })(input)
}

/// A tag is an atom forbidding `+` (RFC 3501 §9, `tag`).
pub(crate) fn command_tag(input: &[u8]) -> IResult<&[u8], Tag> {
    map_res(take_while1(|b| is_atom_char(b) && b != b'+'), |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .map_err(|_| "tag is not valid UTF-8")
            .and_then(|s| Tag::try_from(s).map_err(|_| "malformed tag"))
    })(input)
}

fn unescape_quoted(raw: &[u8]) -> Option<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(b) = iter.next() {
        if b == b'\\' {
            out.push(iter.next()?);
        } else {
            out.push(b);
        }
    }
    String::from_utf8(out).ok()
}

pub(crate) fn quoted(input: &[u8]) -> IResult<&[u8], Quoted> {
    let (input, raw) = delimited(
        char('"'),
        alt((
            nom::bytes::complete::escaped(
                take_while1(is_quoted_text_char),
                '\\',
                nom::character::complete::one_of("\"\\"),
            ),
            nom::combinator::success(&b""[..]),
        )),
        char('"'),
    )(input)?;
    map_res(nom::combinator::success(()), move |_| {
        let text = unescape_quoted(raw).ok_or("invalid escape sequence in quoted string")?;
        Quoted::try_from(text).map_err(|_| "invalid quoted string")
    })(input)
}

fn literal_header(input: &[u8]) -> IResult<&[u8], (u32, LiteralMode, bool)> {
    let (input, binary) = map(opt(char('~')), |o| o.is_some())(input)?;
    let (input, _) = char('{')(input)?;
    let (input, len) = number(input)?;
    let (input, plus) = map(opt(char('+')), |o| o.is_some())(input)?;
    let (input, _) = char('}')(input)?;
    let (input, _) = crlf(input)?;
    let mode = if plus { LiteralMode::NonSync } else { LiteralMode::Sync };
    Ok((input, (len, mode, binary)))
}

/// A literal, with its announced payload already present in `input` (the
/// framing layer only hands a command to this parser once the full
/// literal body has been read off the wire).
pub(crate) fn literal(input: &[u8]) -> IResult<&[u8], Literal> {
    let (input, (len, mode, binary)) = literal_header(input)?;
    let (input, data) = take(len)(input)?;
    let lit = Literal::new(data.to_vec()).with_mode(mode).with_binary(binary);
    Ok((input, lit))
}

pub(crate) fn istring(input: &[u8]) -> IResult<&[u8], IString> {
    alt((
        map(quoted, IString::Quoted),
        map(literal, IString::Literal),
    ))(input)
}

pub(crate) fn nstring(input: &[u8]) -> IResult<&[u8], NString> {
    alt((
        value(NString(None), tag_no_case("NIL")),
        map(istring, |s| NString(Some(s))),
    ))(input)
}

pub(crate) fn astring(input: &[u8]) -> IResult<&[u8], AString> {
    alt((
        map(atom, AString::Atom),
        map(istring, AString::String),
    ))(input)
}

/// `mailbox` is an `astring`; `INBOX` case-folding happens in
/// `Mailbox::new`, not here.
pub(crate) fn mailbox_name(input: &[u8]) -> IResult<&[u8], String> {
    map(astring, |a| a.as_str().unwrap_or_default().to_string())(input)
}

/// A parenthesized, space-separated list, e.g. flag lists and capability
/// lists. `item` must itself consume no leading/trailing space.
pub(crate) fn paren_list<'a, O>(
    item: impl Fn(&'a [u8]) -> IResult<&'a [u8], O> + Copy,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Vec<O>> {
    move |input: &'a [u8]| {
        delimited(
            char('('),
            alt((
                map(
                    pair(item, many0(preceded(sp, item))),
                    |(first, rest)| {
                        let mut v = vec![first];
                        v.extend(rest);
                        v
                    },
                ),
                map(nom::combinator::success(()), |_| Vec::new()),
            )),
            char(')'),
        )(input)
    }
}

pub(crate) fn quoted_or_atom_string(input: &[u8]) -> IResult<&[u8], String> {
    map(astring, |a| a.as_str().unwrap_or_default().to_string())(input)
}

/// A bare sequence-set token: digits, `:`, `,`, `*`.
pub(crate) fn seq_set_token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|b: u8| b.is_ascii_digit() || b == b':' || b == b',' || b == b'*')(input)
}

pub(crate) fn terminated_by_crlf<'a, O>(
    parser: impl Fn(&'a [u8]) -> IResult<&'a [u8], O>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], O> {
    move |input| terminated(&parser, crlf)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_parses_up_to_special() {
        let (rest, a) = atom(b"LOGIN foo").unwrap();
        assert_eq!(a.as_str(), "LOGIN");
        assert_eq!(rest, b" foo");
    }

    #[test]
    fn quoted_unescapes() {
        let (rest, q) = quoted(br#""a\"b" tail"#).unwrap();
        assert_eq!(q.as_str(), "a\"b");
        assert_eq!(rest, b" tail");
    }

    #[test]
    fn literal_takes_exact_length() {
        let (rest, lit) = literal(b"{5}\r\nhello and then some").unwrap();
        assert_eq!(lit.as_bytes(), b"hello");
        assert_eq!(rest, b" and then some");
    }

    #[test]
    fn literal_plus_is_non_sync() {
        let (_, lit) = literal(b"{3+}\r\nabc").unwrap();
        assert_eq!(lit.mode(), LiteralMode::NonSync);
    }

    #[test]
    fn binary_literal_header() {
        let (_, lit) = literal(b"~{3}\r\nabc").unwrap();
        assert!(lit.is_binary());
    }

    #[test]
    fn nstring_nil() {
        let (_, n) = nstring(b"NIL").unwrap();
        assert_eq!(n.as_str(), None);
    }
}
