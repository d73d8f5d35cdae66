use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::audio::AudioPath;
use crate::extractor::FeatureExtractor;
use crate::streamer::ResultStreamer;
use crate::worker::{FingerprintResult, Worker};

/// 把一个批次的文件分发到固定大小的线程池
pub struct JobDispatcher<E> {
    worker: Worker<E>,
    pool: ThreadPool,
}

impl<E: FeatureExtractor> JobDispatcher<E> {
    /// `workers` 为 0 时使用 CPU 逻辑核数
    pub fn new(worker: Worker<E>, workers: usize) -> Result<Self> {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("audedup-worker-{i}"))
            .build()?;
        Ok(Self { worker, pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn worker(&self) -> &Worker<E> {
        &self.worker
    }

    /// 处理一个批次，阻塞直到每个文件都产生结果
    ///
    /// 每个结果完成后立即写回连接，返回值按输入顺序排列。
    pub fn dispatch<W>(
        &self,
        paths: Vec<AudioPath>,
        streamer: &ResultStreamer<W>,
    ) -> Vec<FingerprintResult>
    where
        W: Write + Send,
    {
        let total = paths.len();
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = &self.worker;

        self.pool.scope(|s| {
            for (idx, path) in paths.into_iter().enumerate() {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let result = worker.process(Arc::new(path));
                    streamer.submit(&result);
                    // 接收端在 scope 结束后才读取，不会断开
                    let _ = tx.send((idx, result));
                });
            }
        });
        drop(tx);

        let mut slots = (0..total).map(|_| None).collect::<Vec<Option<FingerprintResult>>>();
        for (idx, result) in rx {
            slots[idx] = Some(result);
        }
        debug!("批次完成: {} 个文件", total);
        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;

    use anyhow::{Result, bail};
    use crossbeam_channel::{Sender, bounded, unbounded};

    use super::*;
    use crate::audio::Features;
    use crate::digest::DigestAlgorithm;
    use crate::protocol::read_records;

    fn extractor(path: &Path) -> Result<Features> {
        let name = path.file_stem().unwrap().to_string_lossy().to_string();
        if name.starts_with("bad") {
            bail!("corrupt stream");
        }
        // 前面的文件耗时更长，完成顺序与输入顺序相反
        let n: u64 = name.trim_start_matches("song").parse().unwrap_or(0);
        thread::sleep(Duration::from_millis(50u64.saturating_sub(n * 5)));
        Ok(Features::new(vec![n as f32]))
    }

    fn paths(names: &[&str]) -> Vec<AudioPath> {
        names.iter().map(|n| AudioPath::new(format!("/music/{n}.mp3"))).collect()
    }

    #[test]
    fn test_default_pool_size() {
        let worker = Worker::new(extractor, DigestAlgorithm::Md5);
        let dispatcher = JobDispatcher::new(worker, 0).unwrap();
        assert_eq!(dispatcher.workers(), num_cpus::get());
    }

    #[test]
    fn test_every_path_yields_one_result() {
        let worker = Worker::new(extractor, DigestAlgorithm::Md5);
        let dispatcher = JobDispatcher::new(worker, 4).unwrap();
        let streamer = ResultStreamer::new(Vec::new());
        let input = paths(&["song1", "bad1", "song2", "bad2", "song3", "song4"]);

        let results = dispatcher.dispatch(input.clone(), &streamer);

        assert_eq!(results.len(), 6);
        assert_eq!(results.iter().filter(|r| r.is_error()).count(), 2);
        // 返回值保持输入顺序
        for (result, path) in results.iter().zip(&input) {
            assert_eq!(result.path.path(), path.path());
        }
        let records =
            read_records(streamer.into_inner().as_slice()).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 6);
    }

    #[test]
    fn test_streamed_records_cover_every_path() {
        let worker = Worker::new(extractor, DigestAlgorithm::Md5);
        let dispatcher = JobDispatcher::new(worker, 8).unwrap();
        let streamer = ResultStreamer::new(Vec::new());
        let input =
            paths(&["song1", "song2", "song3", "song4", "song5", "song6", "song7", "song8"]);
        dispatcher.dispatch(input.clone(), &streamer);

        let mut streamed = read_records(streamer.into_inner().as_slice())
            .map(|r| r.unwrap().path)
            .collect::<Vec<_>>();
        let mut expected = input.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        // 写出顺序不确定，只比较集合
        streamed.sort();
        expected.sort();
        assert_eq!(streamed, expected);
    }

    #[test]
    fn test_empty_batch() {
        let worker = Worker::new(extractor, DigestAlgorithm::Md5);
        let dispatcher = JobDispatcher::new(worker, 2).unwrap();
        let streamer = ResultStreamer::new(Vec::new());
        assert!(dispatcher.dispatch(vec![], &streamer).is_empty());
        assert_eq!(streamer.sent(), 0);
    }

    /// 每次写入都把内容转发到通道
    struct SignalWriter(Sender<String>);

    impl Write for SignalWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let _ = self.0.send(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_record_written_while_other_jobs_run() {
        let (release_tx, release_rx) = bounded::<()>(1);
        let (written_tx, written_rx) = unbounded();
        let blocking = move |path: &Path| -> Result<Features> {
            if path.ends_with("slow.mp3") {
                release_rx.recv()?;
            }
            Ok(Features::new(vec![1.0]))
        };
        let worker = Worker::new(blocking, DigestAlgorithm::Md5);
        let dispatcher = JobDispatcher::new(worker, 2).unwrap();
        let streamer = ResultStreamer::new(SignalWriter(written_tx));

        thread::scope(|s| {
            let handle = s.spawn(|| dispatcher.dispatch(paths(&["slow", "fast"]), &streamer));

            let first = written_rx.recv_timeout(Duration::from_secs(10));
            let finished_early = handle.is_finished();
            // 先放行，断言失败时也不会卡住 scope
            release_tx.send(()).unwrap();
            let results = handle.join().unwrap();

            assert!(first.unwrap().contains("/music/fast.mp3"));
            assert!(!finished_early);
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].path.path(), Path::new("/music/slow.mp3"));
        });
        assert_eq!(streamer.sent(), 2);
    }
}
