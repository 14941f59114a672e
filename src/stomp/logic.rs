//! Codificación y decodificación de tramas STOMP 1.2 sobre mensajes de texto WebSocket.


use crate::stomp::domain::{Command, Frame};
use crate::system::domain::ErrorType;


pub fn encode(frame: &Frame) -> String {
    let mut out = String::with_capacity(64 + frame.body.len());
    out.push_str(frame.command.as_str());
    out.push('\n');

    let escape = frame.command.escapes_headers();
    for (name, value) in &frame.headers {
        if escape {
            out.push_str(&escape_header(name));
            out.push(':');
            out.push_str(&escape_header(value));
        } else {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
        }
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}


/// Decodifica una trama recibida.
///
/// Devuelve `Ok(None)` para los latidos (texto compuesto solo de saltos de línea).
pub fn decode(raw: &str) -> Result<Option<Frame>, ErrorType> {
    let raw = raw.trim_start_matches(['\r', '\n']);
    if raw.is_empty() {
        return Ok(None);
    }

    // El fin de cabeceras es el primer terminador que aparezca, LF o CRLF.
    let (end, separator) = ["\n\n", "\r\n\r\n"]
        .into_iter()
        .filter_map(|sep| raw.find(sep).map(|at| (at, sep.len())))
        .min_by_key(|(at, _)| *at)
        .ok_or_else(|| ErrorType::MalformedMessage("trama STOMP sin fin de cabeceras".into()))?;
    let (head, rest) = (&raw[..end], &raw[end + separator..]);

    let mut lines = head.lines();
    let command: Command = lines
        .next()
        .map(str::trim_end)
        .unwrap_or_default()
        .parse()?;

    let escape = command.escapes_headers();
    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ErrorType::MalformedMessage(format!("cabecera inválida: {line}")))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let mut frame = Frame { command, headers, body: String::new() };

    let body = match frame.get("content-length").map(str::parse::<usize>) {
        Some(Ok(len)) if len <= rest.len() && rest.is_char_boundary(len) => &rest[..len],
        _ => rest.split('\0').next().unwrap_or_default(),
    };
    frame.body = body.to_string();

    Ok(Some(frame))
}


fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}


fn unescape_header(raw: &str) -> Result<String, ErrorType> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ErrorType::MalformedMessage(format!("escape inválido: \\{}", other.unwrap_or(' '))));
            }
        }
    }
    Ok(out)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stomp::domain::HeartBeat;

    #[test]
    fn subscribe_frame_layout() {
        let raw = encode(&Frame::subscribe("sub-0", "/topic/farm/1/sensor-data"));
        assert_eq!(raw, "SUBSCRIBE\nid:sub-0\ndestination:/topic/farm/1/sensor-data\nack:auto\n\n\0");
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let raw = encode(&Frame::connect("farm.example.com", "abc", HeartBeat::new(10_000, 10_000)));
        assert!(raw.starts_with("CONNECT\naccept-version:1.2\nhost:farm.example.com\nheart-beat:10000,10000\n"));
        assert!(raw.contains("Authorization:Bearer abc\n"));
    }

    #[test]
    fn decodes_message_with_body() {
        let raw = "MESSAGE\ndestination:/topic/farm/1/sensor-data\nsubscription:sub-0\nmessage-id:7\n\n{\"temperature\":21.5}\0";
        let frame = decode(raw).unwrap().unwrap();

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/topic/farm/1/sensor-data"));
        assert_eq!(frame.body, "{\"temperature\":21.5}");
    }

    #[test]
    fn crlf_headers_keep_blank_lines_inside_body() {
        let raw = "MESSAGE\r\ndestination:/topic/user/7/notifications\r\n\r\nlinea 1\n\nlinea 2\0";
        let frame = decode(raw).unwrap().unwrap();

        assert_eq!(frame.get("destination"), Some("/topic/user/7/notifications"));
        assert_eq!(frame.body, "linea 1\n\nlinea 2");
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let raw = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = decode(raw).unwrap().unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn heartbeats_decode_to_none() {
        assert_eq!(decode("\n").unwrap(), None);
        assert_eq!(decode("\r\n").unwrap(), None);
    }

    #[test]
    fn header_escapes_are_reversed() {
        let raw = "ERROR\nmessage:bad\\cvalue\\nline\n\n\0";
        let frame = decode(raw).unwrap().unwrap();
        assert_eq!(frame.get("message"), Some("bad:value\nline"));

        let frame = Frame::new(Command::Unsubscribe).header("id", "a:b");
        assert!(encode(&frame).contains("id:a\\cb\n"));
    }

    #[test]
    fn repeated_header_keeps_first_value() {
        let frame = decode("MESSAGE\nfoo:1\nfoo:2\n\n\0").unwrap().unwrap();
        assert_eq!(frame.get("foo"), Some("1"));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode("HELLO\n\n\0"), Err(ErrorType::MalformedMessage(_))));
        assert!(matches!(decode("MESSAGE\nno-terminator"), Err(ErrorType::MalformedMessage(_))));
    }
}
