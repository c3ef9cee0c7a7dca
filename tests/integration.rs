//! Integration tests for the wikishard library.
//!
//! These tests verify the full pipeline: writing a dump file, building the
//! static index from it and reading the shards back.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wikishard::{
    build_index, doc_shard, docstore, postings, term_shard, BuildConfig, Error, IndexReader,
    Posting,
};

/// Wrap page elements in a minimal dump envelope.
fn dump_xml(pages: &[&str]) -> String {
    let mut xml = String::from(
        "<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.10/\" xml:lang=\"en\">\n\
         <siteinfo><sitename>Test</sitename><namespaces><namespace key=\"0\" /></namespaces></siteinfo>\n",
    );
    for page in pages {
        xml.push_str(page);
        xml.push('\n');
    }
    xml.push_str("</mediawiki>\n");
    xml
}

fn page_xml(id: &str, ns: &str, title: &str, text: &str) -> String {
    format!(
        "<page><title>{title}</title><ns>{ns}</ns><id>{id}</id>\
         <revision><id>9{id}</id><contributor><id>77</id></contributor>\
         <text bytes=\"{}\" xml:space=\"preserve\">{text}</text></revision></page>",
        text.len()
    )
}

fn write_plain(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("dump.xml");
    fs::write(&path, xml).unwrap();
    path
}

fn write_bz2(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("dump.xml.bz2");
    let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// Two pages: an article mentioning "cat" twice and "dog" once, and a talk page.
fn two_page_dump() -> String {
    let article = page_xml("1", "0", "Cat", "The cat chased another cat and a dog.");
    let talk = page_xml("2", "1", "Talk:Cat", "Talk about this article");
    dump_xml(&[&article, &talk])
}

/// Every file under `root`, keyed by relative path.
fn collect_tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// Parse the number out of `shard_NNNN.bin`.
fn shard_number(path: &Path) -> u32 {
    let stem = path.file_stem().unwrap().to_str().unwrap();
    stem.trim_start_matches("shard_").parse().unwrap()
}

#[test]
fn test_two_page_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let dump = write_bz2(tmp.path(), &two_page_dump());
    let out = tmp.path().join("public");

    let report = build_index(&dump, BuildConfig::new(&out)).unwrap();
    assert_eq!(report.pages_read, 2);
    assert_eq!(report.documents, 1);
    assert_eq!(report.skipped_namespace, 1);

    assert_eq!(
        fs::read_to_string(out.join("index/meta.json")).unwrap(),
        "{\"docCount\":1,\"shardCount\":4096,\"docShardCount\":65536}\n"
    );

    let reader = IndexReader::open(&out).unwrap();
    assert_eq!(reader.doc_count(), 1);
    assert_eq!(reader.postings("cat").unwrap(), vec![Posting::new(1, vec![1, 4])]);
    assert_eq!(reader.postings("dog").unwrap(), vec![Posting::new(1, vec![7])]);

    // Nothing from the talk page is stored or indexed.
    assert!(reader.document(2).unwrap().is_none());
    assert!(reader.postings("talk").unwrap().is_empty());
    assert!(reader.postings("about").unwrap().is_empty());

    let cat = reader.document(1).unwrap().unwrap();
    assert_eq!(cat.title, "Cat");
    assert_eq!(cat.content, "The cat chased another cat and a dog.");

    let docs: Vec<_> = fs::read_dir(out.join("docs")).unwrap().collect();
    assert_eq!(docs.len(), 1);
    assert!(out.join("docs/shard_00001.bin").exists());
}

#[test]
fn test_plain_and_compressed_dumps_agree() {
    let tmp = TempDir::new().unwrap();
    let xml = two_page_dump();
    let plain_out = tmp.path().join("plain");
    let bz2_out = tmp.path().join("bz2");

    build_index(&write_plain(tmp.path(), &xml), BuildConfig::new(&plain_out)).unwrap();
    build_index(&write_bz2(tmp.path(), &xml), BuildConfig::new(&bz2_out)).unwrap();

    assert_eq!(collect_tree(&plain_out), collect_tree(&bz2_out));
}

#[test]
fn test_markup_is_stripped_before_indexing() {
    let tmp = TempDir::new().unwrap();
    let text = "'''Paris''' is the [[Capital city|capital]] of [[France]].\
                {{Infobox settlement|name=Paris}}&lt;ref&gt;Smith 2001&lt;/ref&gt;\n\
                &lt;!-- editor note --&gt;\n\
                [[Category:Capitals]]";
    let dump = write_plain(tmp.path(), &dump_xml(&[&page_xml("10", "0", "Paris", text)]));
    let out = tmp.path().join("public");
    build_index(&dump, BuildConfig::new(&out)).unwrap();

    let reader = IndexReader::open(&out).unwrap();
    let doc = reader.document(10).unwrap().unwrap();
    assert_eq!(doc.content, "Paris is the capital of France.");

    assert_eq!(reader.postings("paris").unwrap(), vec![Posting::new(10, vec![0])]);
    assert_eq!(reader.postings("france").unwrap(), vec![Posting::new(10, vec![5])]);
    for gone in ["infobox", "smith", "editor", "category", "capitals", "ref"] {
        assert!(reader.postings(gone).unwrap().is_empty(), "{gone} was indexed");
    }
}

#[test]
fn test_postings_span_documents_in_id_order() {
    let tmp = TempDir::new().unwrap();
    let pages = [
        page_xml("300", "0", "C", "river bank"),
        page_xml("5", "0", "A", "bank of the river"),
        page_xml("70000", "0", "B", "river river"),
    ];
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let dump = write_plain(tmp.path(), &dump_xml(&refs));
    let out = tmp.path().join("public");
    build_index(&dump, BuildConfig::new(&out)).unwrap();

    let reader = IndexReader::open(&out).unwrap();
    assert_eq!(
        reader.postings("river").unwrap(),
        vec![
            Posting::new(5, vec![3]),
            Posting::new(300, vec![0]),
            Posting::new(70000, vec![0, 1]),
        ]
    );
    assert_eq!(reader.document(70000).unwrap().unwrap().title, "B");
}

#[test]
fn test_shards_are_sorted_and_correctly_placed() {
    let tmp = TempDir::new().unwrap();
    let words = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
        "juliet", "kilo", "lima", "mike", "november", "oscar", "papa",
    ];
    let pages: Vec<String> = (0..40u32)
        .map(|i| {
            let text: Vec<&str> = (0..12).map(|j| words[((i * 7 + j * 3) % 16) as usize]).collect();
            page_xml(&(i * 977 + 1).to_string(), "0", &format!("Page {i}"), &text.join(" "))
        })
        .collect();
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let dump = write_plain(tmp.path(), &dump_xml(&refs));
    let out = tmp.path().join("public");
    build_index(&dump, BuildConfig::new(&out)).unwrap();

    for entry in fs::read_dir(out.join("index")).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|e| e == "json") {
            continue;
        }
        let shard = shard_number(&path);
        let terms = postings::decode_shard(&fs::read(&path).unwrap()).unwrap();
        assert!(!terms.is_empty());
        assert!(terms.windows(2).all(|w| w[0].term < w[1].term));
        for entry in &terms {
            assert_eq!(term_shard(&entry.term), shard);
            assert!(entry.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id));
            for posting in &entry.postings {
                assert!(!posting.positions.is_empty());
                assert!(posting.positions.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    let mut stored = 0;
    for entry in fs::read_dir(out.join("docs")).unwrap() {
        let path = entry.unwrap().path();
        let shard = shard_number(&path);
        for doc in docstore::decode_shard(&fs::read(&path).unwrap()).unwrap() {
            assert_eq!(doc_shard(doc.id), shard);
            stored += 1;
        }
    }
    assert_eq!(stored, 40);
}

#[test]
fn test_rebuild_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let pages = [
        page_xml("1", "0", "One", "red green blue"),
        page_xml("2", "0", "Two", "green blue yellow green"),
        page_xml("3", "14", "Category:Colors", "red"),
        page_xml("65537", "0", "Three", "blue"),
    ];
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let dump = write_bz2(tmp.path(), &dump_xml(&refs));

    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    build_index(&dump, BuildConfig::new(&first)).unwrap();
    build_index(&dump, BuildConfig::new(&second)).unwrap();
    let before = collect_tree(&first);
    assert_eq!(before, collect_tree(&second));

    // Rebuilding over an existing output gives the same tree again.
    build_index(&dump, BuildConfig::new(&first)).unwrap();
    assert_eq!(before, collect_tree(&first));
}

#[test]
fn test_malformed_and_duplicate_pages_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let pages = [
        page_xml("1", "0", "Good", "kept words"),
        page_xml("abc", "0", "Bad id", "lost words"),
        page_xml("1", "0", "Same id", "shadow words"),
        "<page><title>No id</title><ns>0</ns><revision><text>orphan</text></revision></page>"
            .to_string(),
        page_xml("2", "0", "Also good", "more words"),
    ];
    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    let dump = write_plain(tmp.path(), &dump_xml(&refs));
    let out = tmp.path().join("public");

    let report = build_index(&dump, BuildConfig::new(&out)).unwrap();
    assert_eq!(report.pages_read, 5);
    assert_eq!(report.documents, 2);
    assert_eq!(report.malformed_pages, 2);
    assert_eq!(report.duplicate_pages, 1);

    let reader = IndexReader::open(&out).unwrap();
    assert_eq!(reader.doc_count(), 2);
    assert_eq!(reader.document(1).unwrap().unwrap().title, "Good");
    assert!(reader.postings("shadow").unwrap().is_empty());
    assert!(reader.postings("orphan").unwrap().is_empty());
    assert_eq!(
        reader.postings("words").unwrap(),
        vec![Posting::new(1, vec![1]), Posting::new(2, vec![1])]
    );
}

#[test]
fn test_empty_dump_writes_meta_only() {
    let tmp = TempDir::new().unwrap();
    let dump = write_plain(tmp.path(), &dump_xml(&[]));
    let out = tmp.path().join("public");

    let report = build_index(&dump, BuildConfig::new(&out)).unwrap();
    assert_eq!(report.documents, 0);

    let tree = collect_tree(&out);
    assert_eq!(tree.len(), 1);
    assert!(tree.contains_key(Path::new("index/meta.json")));
    assert!(out.join("docs").is_dir());
    assert_eq!(IndexReader::open(&out).unwrap().doc_count(), 0);
}

#[test]
fn test_failed_build_keeps_previous_output() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("public");
    let good = write_bz2(tmp.path(), &two_page_dump());
    build_index(&good, BuildConfig::new(&out)).unwrap();
    let before = collect_tree(&out);

    // Cut off in the middle of a page.
    let truncated = tmp.path().join("truncated.xml");
    let xml = two_page_dump();
    fs::write(&truncated, &xml[..xml.find("chased").unwrap()]).unwrap();

    assert!(build_index(&truncated, BuildConfig::new(&out)).is_err());
    assert_eq!(before, collect_tree(&out));

    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".wikishard-staging-"))
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

#[test]
fn test_missing_dump_is_open_error() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("public");
    let err = build_index(&tmp.path().join("nope.xml.bz2"), BuildConfig::new(&out)).unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
    assert!(!out.join("index").exists());
}

#[test]
fn test_other_files_under_root_survive() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("public");
    fs::create_dir_all(out.join("assets")).unwrap();
    fs::write(out.join("index.html"), "<html></html>").unwrap();
    fs::write(out.join("assets/app.js"), "search()").unwrap();
    fs::create_dir_all(out.join("docs")).unwrap();
    fs::write(out.join("docs/shard_09999.bin"), b"stale").unwrap();

    let dump = write_plain(tmp.path(), &two_page_dump());
    build_index(&dump, BuildConfig::new(&out)).unwrap();

    assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "<html></html>");
    assert_eq!(fs::read_to_string(out.join("assets/app.js")).unwrap(), "search()");
    assert!(!out.join("docs/shard_09999.bin").exists());
    assert!(out.join("docs/shard_00001.bin").exists());
}
