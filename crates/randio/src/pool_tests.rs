/* 📖 # Why are the pool tests in a separate file?

These tests drive the pool with real files from `tempfile` and check the
pool's behaviour as a whole: bounded descriptor count, transparent eviction
and reopening, and stable slot indices. They exercise the handle variants and
the pool together, so they live next to neither.
*/

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::SeekFrom;
    use std::path::{Path, PathBuf};

    use tempfile::{TempDir, tempdir};

    use crate::{Handle, HandlePool, IoHandle, OpenMode, shared_buffer};

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
    }

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn file_pool(max: usize, files: usize, len: usize) -> (TempDir, HandlePool, Vec<Vec<u8>>) {
        let dir = tempdir().unwrap();
        let mut pool = HandlePool::new(max);
        let mut contents = Vec::new();
        for i in 0..files {
            let content = pattern(len, i as u8 * 37);
            let path = write_file(dir.path(), &format!("file{}.bin", i), &content);
            pool.append(Handle::file(path), OpenMode::read()).unwrap();
            contents.push(content);
        }
        (dir, pool, contents)
    }

    #[test]
    fn test_round_robin_keeps_limit_and_offsets() {
        let (_dir, mut pool, contents) = file_pool(2, 5, 64);
        let mut buf = [0u8; 8];

        for round in 0..4usize {
            for index in 0..5 {
                let before = pool.get_offset(index).unwrap();
                assert_eq!(before, (round * 8) as u64);

                assert_eq!(pool.read(index, &mut buf).unwrap(), 8);
                assert!(pool.open_count() <= 2);
                assert_eq!(&buf, &contents[index][round * 8..round * 8 + 8]);
                assert_eq!(pool.get_offset(index).unwrap(), before + 8);
            }
        }
        assert_eq!(pool.open_count(), 2);
        assert_eq!(pool.open_indices(), vec![3, 4]);
    }

    #[test]
    fn test_eviction_tie_break_prefers_lower_index() {
        let (_dir, mut pool, _contents) = file_pool(2, 3, 16);
        pool.ensure_open(0).unwrap();
        pool.ensure_open(1).unwrap();
        pool.ensure_open(2).unwrap();

        assert!(!pool.is_open(0).unwrap());
        assert_eq!(pool.open_indices(), vec![1, 2]);
        assert!(!pool.handle(0).unwrap().is_open());
    }

    #[test]
    fn test_removed_index_is_argument_error() {
        let (_dir, mut pool, _contents) = file_pool(1, 2, 16);
        pool.ensure_open(0).unwrap();
        pool.remove(0).unwrap();
        assert_eq!(pool.open_count(), 0);

        let mut buf = [0u8; 4];
        let errors = [
            pool.read(0, &mut buf).unwrap_err(),
            pool.ensure_open(0).unwrap_err(),
            pool.close(0).unwrap_err(),
            pool.get_offset(0).unwrap_err(),
            pool.remove(0).unwrap_err(),
        ];
        for error in &errors {
            assert_eq!(error.kind().name(), "ArgumentError");
        }
        assert!(errors[0].to_string().ends_with("pool slot 0 was removed"));

        // The other slot and the next index are unaffected.
        assert_eq!(pool.read(1, &mut buf).unwrap(), 4);
        let index = pool.append(Handle::file("/unused"), OpenMode::read()).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn test_range_and_file_alternate_through_one_descriptor() {
        let dir = tempdir().unwrap();
        let big = pattern(10 * 1024 * 1024, 0);
        let other = pattern(5 * 1024 * 1024, 0x5a);
        let big_path = write_file(dir.path(), "big.bin", &big);
        let other_path = write_file(dir.path(), "other.bin", &other);

        let mut pool = HandlePool::new(1);
        let range = pool
            .append(
                Handle::file_range(Handle::file(&big_path), 1000, 1000).unwrap(),
                OpenMode::read(),
            )
            .unwrap();
        let file = pool
            .append(Handle::file(&other_path), OpenMode::read())
            .unwrap();

        let mut buf = vec![0u8; 500];

        assert_eq!(pool.read(range, &mut buf).unwrap(), 500);
        assert_eq!(buf, big[1000..1500]);
        assert_eq!(pool.open_count(), 1);

        assert_eq!(pool.read(file, &mut buf).unwrap(), 500);
        assert_eq!(buf, other[0..500]);
        assert_eq!(pool.open_count(), 1);

        assert_eq!(pool.read(range, &mut buf).unwrap(), 500);
        assert_eq!(buf, big[1500..2000]);
        assert_eq!(pool.open_count(), 1);

        assert_eq!(pool.read(file, &mut buf).unwrap(), 500);
        assert_eq!(buf, other[500..1000]);

        assert_eq!(pool.read(range, &mut buf).unwrap(), 0);
        assert_eq!(pool.get_offset(range).unwrap(), 1000);
        assert_eq!(pool.open_count(), 1);
    }

    #[test]
    fn test_clone_is_closed_and_independent() {
        let (_dir, mut pool, contents) = file_pool(2, 3, 32);
        let mut buf = [0u8; 4];
        pool.read(1, &mut buf).unwrap();
        pool.remove(2).unwrap();

        let mut clone = pool.clone_closed().unwrap();
        assert_eq!(clone.open_count(), 0);
        assert_eq!(clone.max_open_handles(), 2);
        assert_eq!(clone.number_of_handles(), 3);
        assert_eq!(
            clone.get_offset(2).unwrap_err().kind().name(),
            "ArgumentError"
        );

        clone.read(1, &mut buf).unwrap();
        assert_eq!(&buf, &contents[1][0..4]);
        clone.seek(1, SeekFrom::Start(20)).unwrap();

        assert_eq!(pool.get_offset(1).unwrap(), 4);
        assert!(pool.is_open(1).unwrap());
        clone.close_all().unwrap();
        assert!(pool.is_open(1).unwrap());
    }

    #[test]
    fn test_writes_continue_after_eviction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let other = write_file(dir.path(), "other.bin", b"other");

        let mut pool = HandlePool::new(1);
        let out = pool
            .append(
                Handle::file(&path),
                OpenMode::read_write().create(true).truncate(true),
            )
            .unwrap();
        let reader = pool.append(Handle::file(&other), OpenMode::read()).unwrap();

        pool.write(out, b"abc").unwrap();
        let mut buf = [0u8; 5];
        pool.read(reader, &mut buf).unwrap();
        assert!(!pool.is_open(out).unwrap());

        // Reopening must not truncate what the first session wrote.
        pool.write(out, b"def").unwrap();
        pool.close_all().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abcdef");
    }

    #[test]
    fn test_pooled_handles_can_be_used_directly_after_removal() {
        let (_dir, mut pool, contents) = file_pool(1, 1, 16);
        pool.seek(0, SeekFrom::Start(10)).unwrap();
        let mut handle = pool.remove(0).unwrap();

        handle.open(OpenMode::read()).unwrap();
        let mut buf = [0u8; 4];
        handle.read(&mut buf).unwrap();
        assert_eq!(&buf, &contents[0][0..4]);
    }

    #[test]
    fn test_failed_eviction_leaves_pool_unchanged() {
        let mut inner = HandlePool::new(1);
        inner
            .append(Handle::memory(shared_buffer(b"inner")), OpenMode::read())
            .unwrap();
        let inner = inner.into_shared();

        let mut pool = HandlePool::new(1);
        let entry = pool
            .append(Handle::pool_entry(inner.clone(), 0), OpenMode::read())
            .unwrap();
        let other = pool
            .append(Handle::memory(shared_buffer(b"other")), OpenMode::read())
            .unwrap();
        pool.ensure_open(entry).unwrap();

        let guard = inner.lock();
        let mut buf = [0u8; 2];
        let err = pool.read(other, &mut buf).unwrap_err();
        assert_eq!(err.kind().name(), "InvalidState");
        assert_eq!(pool.open_count(), 1);
        assert_eq!(pool.open_indices(), vec![entry]);
        assert!(pool.is_open(entry).unwrap());
        assert!(!pool.is_open(other).unwrap());
        drop(guard);

        assert_eq!(pool.read(other, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ot");
        assert_eq!(pool.open_indices(), vec![other]);
        assert!(!inner.lock().is_open(0).unwrap());
    }
}
