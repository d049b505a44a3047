//! SSE 块切分
//!
//! 按空行分隔符从字节缓冲区中切出完整的 SSE 块，上游解析器和帧解析器共用。
//! 切分只在字节层面进行，分隔符是 ASCII，所以被截断的多字节 UTF-8 字符
//! 会留在剩余缓冲区中，等待后续字节补齐。

/// 一个完整的 SSE 块
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseBlock {
    /// `event:` 字段
    pub event: Option<String>,
    /// 所有 `data:` 行以 `\n` 拼接的结果
    pub data: Option<String>,
}

impl SseBlock {
    /// 事件名，缺省为 SSE 规范中的 `message`
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// 解析单个块的文本（不含结尾空行）
    pub fn parse(text: &str) -> Self {
        let mut block = SseBlock::default();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => block.event = Some(value.trim().to_string()),
                "data" => match &mut block.data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => block.data = Some(value.to_string()),
                },
                _ => {}
            }
        }

        block
    }
}

/// 查找下一个空行分隔符
///
/// 返回 (块结束位置, 分隔符长度)，同时接受 `\n\n` 和 `\r\n\r\n`
fn find_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find_subslice(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find_subslice(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// 从缓冲区切出所有完整的块
///
/// # 返回
///
/// (完整块列表, 已消费的字节数)，未消费的字节属于尚未结束的块
pub fn split_blocks(buf: &[u8]) -> (Vec<SseBlock>, usize) {
    let mut blocks = Vec::new();
    let mut consumed = 0;

    while let Some((end, delimiter_len)) = find_delimiter(&buf[consumed..]) {
        let raw = &buf[consumed..consumed + end];
        blocks.push(SseBlock::parse(&String::from_utf8_lossy(raw)));
        consumed += end + delimiter_len;
    }

    (blocks, consumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_and_data() {
        let block = SseBlock::parse("event: delta\ndata: {\"a\":1}");
        assert_eq!(block.event.as_deref(), Some("delta"));
        assert_eq!(block.data.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_parse_multiline_data() {
        let block = SseBlock::parse("event: activity\ndata: {\"a\":\ndata: 1}");
        assert_eq!(block.data.as_deref(), Some("{\"a\":\n1}"));
    }

    #[test]
    fn test_parse_comment_and_unknown_fields() {
        let block = SseBlock::parse(": keep-alive\nid: 7\nretry: 100\ndata: x");
        assert_eq!(block.event, None);
        assert_eq!(block.event_name(), "message");
        assert_eq!(block.data.as_deref(), Some("x"));
    }

    #[test]
    fn test_parse_without_space_after_colon() {
        let block = SseBlock::parse("event:done\ndata:{}");
        assert_eq!(block.event.as_deref(), Some("done"));
        assert_eq!(block.data.as_deref(), Some("{}"));
    }

    #[test]
    fn test_split_blocks_keeps_partial_tail() {
        let buf = b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\nevent: c\nda";
        let (blocks, consumed) = split_blocks(buf);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].event.as_deref(), Some("b"));
        assert_eq!(&buf[consumed..], b"event: c\nda");
    }

    #[test]
    fn test_split_blocks_crlf() {
        let buf = b"event: a\r\ndata: 1\r\n\r\nevent: b\ndata: 2\n\n";
        let (blocks, consumed) = split_blocks(buf);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].event.as_deref(), Some("a"));
        assert_eq!(blocks[0].data.as_deref(), Some("1"));
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_split_blocks_no_delimiter() {
        let (blocks, consumed) = split_blocks(b"event: a\ndata: 1\n");
        assert!(blocks.is_empty());
        assert_eq!(consumed, 0);
    }
}
