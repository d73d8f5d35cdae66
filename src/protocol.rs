//! 指纹服务的线上格式
//!
//! 请求：以 `|` 连接的文件路径，以换行符或客户端关闭写端结束。
//! 响应：每个文件一条 JSON 记录，记录之间以换行分隔，按完成顺序写出。

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, warn};

use crate::audio::AudioPath;
use crate::streamer::ResultRecord;

/// 路径分隔符，不做转义
pub const DELIMITER: char = '|';

/// 单个请求的最大字节数
pub const MAX_REQUEST_BYTES: u64 = 16 * 1024 * 1024;

/// 读取一个请求，超出大小限制的请求视为空批次
pub fn read_request<R: Read>(reader: R) -> io::Result<Vec<AudioPath>> {
    let mut buf = Vec::new();
    BufReader::new(reader.take(MAX_REQUEST_BYTES + 1)).read_until(b'\n', &mut buf)?;
    if buf.len() as u64 > MAX_REQUEST_BYTES {
        warn!("请求超过 {} 字节，已忽略", MAX_REQUEST_BYTES);
        return Ok(vec![]);
    }
    Ok(parse_request(&String::from_utf8_lossy(&buf)))
}

/// 拆分请求文本
///
/// 空片段与相对路径会被丢弃。路径按字面规范化（去掉 `.` 与多余的 `/`），
/// 同一文件只保留第一次出现。
pub fn parse_request(text: &str) -> Vec<AudioPath> {
    let mut seen = HashSet::new();
    text.trim_end_matches(['\r', '\n'])
        .split(DELIMITER)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let path = Path::new(s).components().collect::<PathBuf>();
            if !path.is_absolute() {
                warn!("不是绝对路径，已跳过: {}", s);
                return None;
            }
            if !seen.insert(path.clone()) {
                debug!("重复的路径，已跳过: {}", s);
                return None;
            }
            Some(AudioPath::new(path))
        })
        .collect()
}

/// 编码一个请求，路径中不能出现分隔符或换行
pub fn encode_request<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<u8>> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref().to_string_lossy();
        if path.contains(DELIMITER) || path.contains('\n') {
            bail!("路径中包含分隔符: {}", path);
        }
        parts.push(path);
    }
    let mut buf = parts.join("|").into_bytes();
    buf.push(b'\n');
    Ok(buf)
}

/// 逐条解析响应记录
pub fn read_records<R: Read>(reader: R) -> impl Iterator<Item = serde_json::Result<ResultRecord>> {
    serde_json::Deserializer::from_reader(reader).into_iter::<ResultRecord>()
}

/// 提交一个批次，每收到一条记录调用一次 `on_record`，返回记录总数
pub fn request_batch<P, F>(addr: SocketAddr, paths: &[P], mut on_record: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(ResultRecord),
{
    let mut stream =
        TcpStream::connect(addr).with_context(|| format!("无法连接指纹服务 {}", addr))?;
    stream.write_all(&encode_request(paths)?)?;
    stream.shutdown(Shutdown::Write)?;

    let mut count = 0;
    for record in read_records(BufReader::new(stream)) {
        on_record(record.context("解析响应失败")?);
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let paths = parse_request("/a.mp3|/b c.flac|/d.wav\n");
        let paths = paths.iter().map(|p| p.path().to_path_buf()).collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![PathBuf::from("/a.mp3"), PathBuf::from("/b c.flac"), PathBuf::from("/d.wav")]
        );
    }

    #[test]
    fn test_parse_malformed_request() {
        assert!(parse_request("").is_empty());
        assert!(parse_request("\r\n").is_empty());
        assert!(parse_request("|||").is_empty());
        assert_eq!(parse_request("|/a.mp3||").len(), 1);
    }

    #[test]
    fn test_parse_request_drops_repeated_paths() {
        let paths = parse_request("/m/a.mp3|/m/b.mp3|/m/a.mp3|/m/./a.mp3|/m//a.mp3");
        let paths = paths.iter().map(|p| p.path().to_path_buf()).collect::<Vec<_>>();
        assert_eq!(paths, vec![PathBuf::from("/m/a.mp3"), PathBuf::from("/m/b.mp3")]);
    }

    #[test]
    fn test_parse_request_skips_relative_paths() {
        let paths = parse_request("a.mp3|./b.mp3|../c.mp3|/m/d.mp3");
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path(), Path::new("/m/d.mp3"));
    }

    #[test]
    fn test_read_request_stops_at_newline() {
        let input = b"/a.mp3|/b.mp3\ntrailing garbage";
        let paths = read_request(&input[..]).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_read_request_until_eof() {
        let paths = read_request(&b"/a.mp3|/b.mp3"[..]).unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_read_request_too_large() {
        let input = vec![b'a'; MAX_REQUEST_BYTES as usize + 10];
        assert!(read_request(input.as_slice()).unwrap().is_empty());
    }

    #[test]
    fn test_encode_request() {
        let buf = encode_request(&["/a.mp3", "/b.mp3"]).unwrap();
        assert_eq!(buf, b"/a.mp3|/b.mp3\n");
        assert!(encode_request(&["/a|b.mp3"]).is_err());
    }

    #[test]
    fn test_read_concatenated_records() {
        // 没有换行的记录也能逐条解析
        let input = br#"{"digest":"aa","path":"/1"}{"digest":"error","path":"/2"}
{"digest":"bb","path":"/3","tempo":90.0}"#;
        let records = read_records(&input[..]).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[1].is_error());
        assert_eq!(records[2].tempo, Some(90.0));
    }
}
