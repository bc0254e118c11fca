use std::fs;
use std::path::Path;

use ndxscript::prelude::*;
use ndxscript::Error;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const STORY: [u8; 4] = [0x18, 0x00, 0x0C, 0x04];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn codec() -> CodecTable {
    CodecTable::ascii()
        .with_tag(0x05, "Wait")
        .with_param(0x10, "VSM_")
}

/// Two story records, strings section at 0x30.
///
/// 0x30 sentinel, 0x31 "Reid", 0x36 "Ok", 0x39 voiced two-bubble line,
/// 0x46 "Yo", then alignment padding.
fn scene() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x30];
    bytes[0..4].copy_from_slice(b"TSS\0");
    bytes[0x0C..0x10].copy_from_slice(&0x30u32.to_le_bytes());
    bytes[0x10..0x14].copy_from_slice(&STORY);
    bytes[0x14..0x18].copy_from_slice(&[0x09, 0x00, 0x01, 0x00]);
    bytes[0x18..0x1C].copy_from_slice(&STORY);
    bytes[0x1C..0x20].copy_from_slice(&[0x16, 0x00, 0x06, 0x00]);

    bytes.extend_from_slice(b"\0Reid\0Ok\0");
    bytes.extend_from_slice(&[0x01, 0x10, 0x04]);
    bytes.extend_from_slice(b"0012Hi\x0CGo\0");
    bytes.extend_from_slice(b"Yo\0");
    bytes.extend_from_slice(&[0, 0, 0]);
    bytes
}

fn sources(document: &IrDocument) -> Vec<String> {
    document
        .string_entries()
        .map(|(_, e)| e.source.clone())
        .collect()
}

#[test]
fn test_extract_structure() {
    init_tracing();
    let context = TssContext::new(codec());
    let script = TssScript::parse(scene(), &context).unwrap();
    let document = script.extract(&ExportOptions::default());

    let speakers: Vec<_> = document
        .speakers()
        .unwrap()
        .entries
        .iter()
        .map(|e| (e.id, e.source.as_str()))
        .collect();
    assert_eq!(speakers, vec![(1, "Reid"), (2, "Ok")]);

    let entries: Vec<_> = document.string_entries().map(|(_, e)| e).collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].source, "Hi");
    assert_eq!(entries[0].voice_id.as_deref(), Some("VSM_0012"));
    assert_eq!(entries[0].bubble_id, Some(0));
    assert_eq!(entries[1].source, "Go");
    assert_eq!(entries[1].voice_id, None);
    assert_eq!(entries[1].bubble_id, Some(1));
    assert_eq!(entries[1].pointer_offsets, vec![0x14]);
    assert_eq!(entries[2].speaker_id, Some(2));
}

#[test]
fn test_untouched_ir_repacks_to_the_same_bytes() {
    init_tracing();
    let dir = tempdir().unwrap();
    let source = dir.path().join("ep_000.tss");
    let xml = dir.path().join("ep_000.xml");
    let packed = dir.path().join("ep_000.out.tss");
    fs::write(&source, scene()).unwrap();
    let context = TssContext::new(codec());

    extract_tss_file(&source, &xml, &context, false).unwrap();
    pack_tss_file(&source, &xml, &packed, &context, &InsertionMask::new()).unwrap();

    let original = scene();
    let repacked = fs::read(&packed).unwrap();
    assert_eq!(
        normalize_trailing_padding(&repacked),
        normalize_trailing_padding(&original)
    );
}

#[test]
fn test_round_trip_through_xml_and_empty_merge() {
    init_tracing();
    let codec = codec();
    let bytes = scene();
    let encoding = PointerEncoding::RelativeU16 { base: 0x30 };

    let matches = scan(&bytes, &SignatureTable::tss(), encoding).unwrap();
    let mut graph = build(&bytes, &matches, &codec, encoding).unwrap();
    let exported = to_ir(&graph, &ExportOptions::all());
    let reloaded = from_xml(&to_xml(&exported).unwrap()).unwrap();
    let merged = merge(&reloaded, &IrDocument::default(), &MergeOptions::default());
    assert_eq!(merged, exported);

    let output = repack_script(
        &bytes,
        &mut graph,
        &merged,
        &codec,
        &InsertionMask::new(),
        encoding,
    )
    .unwrap();
    assert_eq!(
        normalize_trailing_padding(&output.bytes),
        normalize_trailing_padding(&bytes)
    );
}

#[test]
fn test_translation_workflow() {
    init_tracing();
    let dir = tempdir().unwrap();
    let source = dir.path().join("ep_000.tss");
    let xml = dir.path().join("xml").join("ep_000.xml");
    fs::write(&source, scene()).unwrap();
    let context = TssContext::new(codec());

    extract_tss_file(&source, &xml, &context, false).unwrap();

    // A translator edits the XML
    let mut document = read_ir(&xml).unwrap();
    for section in &mut document.sections {
        for entry in &mut section.entries {
            let (target, status) = match entry.source.as_str() {
                "Hi" => ("Hello", Status::Done),
                "Go" => ("Move", Status::Proofreading),
                "Ok" => ("Okay", Status::Done),
                _ => continue,
            };
            entry.target = Some(target.to_string());
            entry.status = status;
        }
    }
    write_ir(&xml, &document).unwrap();

    // Re-extraction keeps the edits
    let refreshed = extract_tss_file(&source, &xml, &context, true).unwrap();
    assert_eq!(refreshed, document);
    assert_eq!(merge(&refreshed, &refreshed, &MergeOptions::default()), refreshed);

    // Default mask only inserts Done entries
    let packed = dir.path().join("out").join("ep_000.tss");
    pack_tss_file(&source, &xml, &packed, &context, &InsertionMask::new()).unwrap();
    let script = TssScript::parse(fs::read(&packed).unwrap(), &context).unwrap();
    let repacked = script.extract(&ExportOptions::default());
    assert_eq!(sources(&repacked), vec!["Hello", "Go", "Yo"]);
    assert_eq!(
        repacked.string_entries().next().unwrap().1.voice_id.as_deref(),
        Some("VSM_0012")
    );
    let names: Vec<_> = script.graph().speakers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Reid", "Okay"]);

    let mask = InsertionMask::new().with_proofreading();
    pack_tss_file(&source, &xml, &packed, &context, &mask).unwrap();
    let script = TssScript::parse(fs::read(&packed).unwrap(), &context).unwrap();
    assert_eq!(
        sources(&script.extract(&ExportOptions::default())),
        vec!["Hello", "Move", "Yo"]
    );
}

#[test]
fn test_unknown_token_fails_the_file_without_output() {
    init_tracing();
    let dir = tempdir().unwrap();
    let source = dir.path().join("ep_000.tss");
    let xml = dir.path().join("ep_000.xml");
    let packed = dir.path().join("ep_000.out.tss");
    fs::write(&source, scene()).unwrap();
    let context = TssContext::new(codec());

    let mut document = extract_tss_file(&source, &xml, &context, false).unwrap();
    let entry = &mut document.sections[1].entries[2];
    entry.target = Some("<Nope>".to_string());
    entry.status = Status::Done;
    write_ir(&xml, &document).unwrap();

    let err = pack_tss_file(&source, &xml, &packed, &context, &InsertionMask::new()).unwrap_err();
    let Error::File { source: inner, .. } = err else {
        panic!("expected a file error");
    };
    assert!(matches!(
        *inner,
        Error::Entry { ref section, entry_id: 2, .. } if section == "Story"
    ));
    assert!(!packed.exists());
}

#[test]
fn test_batch_extract_reports_failures() {
    init_tracing();
    let dir = tempdir().unwrap();
    let map = dir.path().join("map");
    let xml = dir.path().join("xml");
    fs::create_dir_all(&map).unwrap();
    fs::write(map.join("ep_000.tss"), scene()).unwrap();
    fs::write(map.join("ep_001.tss"), scene()).unwrap();
    fs::write(map.join("broken.tss"), b"NOPE").unwrap();
    fs::write(map.join("notes.txt"), b"ignored").unwrap();
    let context = TssContext::new(codec());

    let files = find_files(&map, "tss");
    assert_eq!(files.len(), 3);

    let result = run_batch(&files, |path: &Path| {
        let name = path.with_extension("xml");
        let name = name.file_name().unwrap_or_default();
        extract_tss_file(path, xml.join(name), &context, false)
    });

    assert_eq!(result.success_count, 2);
    assert_eq!(result.fail_count, 1);
    let (path, err) = &result.failures[0];
    assert_eq!(path, &map.join("broken.tss"));
    assert!(matches!(
        err,
        Error::File { source, .. } if matches!(**source, Error::InvalidTssMagic(_))
    ));
    assert!(xml.join("ep_000.xml").exists());
    assert!(xml.join("ep_001.xml").exists());
}

#[test]
fn test_fixed_pool_sequence() {
    let mut allocator = PoolAllocator::from_safe_areas(&[(300, 320), (100, 104), (200, 210)]);
    assert_eq!(allocator.allocate(5), Some(200));
    assert_eq!(allocator.allocate(12), Some(300));
    assert_eq!(allocator.allocate(3), Some(100));
    assert_eq!(allocator.allocate(9), None);
}
