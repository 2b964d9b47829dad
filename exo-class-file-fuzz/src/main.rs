use std::{io::Cursor, fs::File};

use afl::fuzz;
use exo_class_file::{item::{file::ClassFile, ClassFileItem}, stream::ClassFileStream};

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(v) = ClassFile::read_from_stream(&mut ClassFileStream::new(&mut Cursor::new(data)), None) {
            let _ = v.constant_pool.verify_cp_index_types();
            let _ = v.constant_pool.verify_structure(&v);

            // Anything that parses should re-encode into something that
            // parses again; a failure here is a writer bug, not a
            // malformed-input rejection.
            if let Ok(rewritten) = v.encode() {
                if let Err(e) = ClassFile::read_from_stream(&mut ClassFileStream::new(&mut Cursor::new(&rewritten)), None) {
                    panic!("re-encoded class file failed to parse back: {e:?}");
                }
            }
        }
    });
}

// #[test]
// fn epic_fuzz_test() {
//     if let Ok(v) = ClassFile::read_from_stream(&mut ClassFileStream::new(&mut File::open("").unwrap()), None) {
//         let _ = v.constant_pool.verify_cp_index_types();
//         let _ = v.constant_pool.verify_structure(&v);
//     }
// }