use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use calamine::{open_workbook_auto, Reader};
use rust_xlsxwriter::Workbook;

use crate::domain::presets::{Preset, MARKETPLACE_TEMPLATE_SHEET, MARKETPLACE_VIDEO_SHEET};
use crate::infra::profile::json_store::JsonProfileStore;
use crate::infra::xlsx::reader::{cell_to_string, CalamineOpener};
use crate::infra::xlsx::writer::XlsxSink;
use crate::platform::desktop::worker::spawn_merge;
use crate::usecase::ports::profile_store::{ProfileError, ProfileStore};
use crate::usecase::ports::spreadsheet::{SheetIoError, SourceOpener, SpreadsheetSink};
use crate::usecase::services::analyze_service::BaseAnalyzer;
use crate::*;

fn unique_test_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("excel-merger-{prefix}-{nanos}"))
}

fn row(cells: &[&str]) -> Row {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Writes `sheets` as string cells; empty strings leave the cell blank.
fn write_fixture(path: &Path, sheets: &[(&str, Vec<Row>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("should name fixture sheet");
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                worksheet
                    .write_string(r as u32, c as u16, value)
                    .expect("should write fixture cell");
            }
        }
    }
    workbook.save(path).expect("should save fixture workbook");
}

fn read_back(path: &Path, sheet: &str) -> Vec<Row> {
    let mut workbook = open_workbook_auto(path).expect("should open merged workbook");
    let range = workbook
        .worksheet_range(sheet)
        .expect("merged sheet should exist");
    range
        .rows()
        .map(|cells| {
            let mut row: Row = cells.iter().map(cell_to_string).collect();
            while row.last().is_some_and(|cell| cell.is_empty()) {
                row.pop();
            }
            row
        })
        .collect()
}

fn opener() -> Arc<dyn SourceOpener> {
    Arc::new(CalamineOpener::new())
}

fn sales_header() -> Vec<Row> {
    vec![
        row(&["Weekly sales"]),
        row(&["generated"]),
        Vec::new(),
        row(&["all values in RUB"]),
        row(&["Id", "Brand", "Amount"]),
    ]
}

fn sales_rows(prefix: &str) -> Vec<Row> {
    let mut rows = sales_header();
    for i in 0..8 {
        rows.push(row(&[&format!("{prefix}-{i}"), "Shuzzi", &format!("{}", i * 10)]));
        if i == 3 || i == 5 {
            rows.push(row(&["", "", ""]));
        }
    }
    rows
}

#[test]
fn calamine_source_keeps_leading_offsets() {
    let temp_dir = unique_test_dir("offsets");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let path = temp_dir.join("offset.xlsx");
    write_fixture(
        &path,
        &[(
            "S",
            vec![row(&[""]), row(&["", "", ""]), row(&["", "Id", "Name", ""]), row(&["", "1"])],
        )],
    );

    let mut source = opener().open(&path).expect("should open workbook");
    let rows = source.read_all_rows("S").expect("should read sheet");
    source.close();

    assert_eq!(
        rows,
        vec![
            Vec::<String>::new(),
            Vec::new(),
            row(&["", "Id", "Name"]),
            row(&["", "1"]),
        ]
    );

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn calamine_opener_rejects_missing_and_foreign_files() {
    let temp_dir = unique_test_dir("open-errors");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let text = temp_dir.join("notes.txt");
    fs::write(&text, "plain text").expect("should write text file");

    let missing = opener().open(&temp_dir.join("missing.xlsx")).err();
    let foreign = opener().open(&text).err();

    assert!(matches!(missing, Some(SheetIoError::FileNotFound { .. })));
    assert!(matches!(foreign, Some(SheetIoError::InvalidFormat { .. })));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn merge_writes_header_block_and_data_rows() {
    let temp_dir = unique_test_dir("merge-sales");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let base = temp_dir.join("A.xlsx");
    let second = temp_dir.join("B.xlsx");
    let third = temp_dir.join("C.xlsx");
    let output = temp_dir.join("merged.xlsx");
    write_fixture(&base, &[("Sales", sales_header()), ("Notes", vec![row(&["n"])])]);
    write_fixture(&second, &[("Sales", sales_rows("b"))]);
    write_fixture(&third, &[("Sales", sales_rows("c"))]);

    let request = MergeRequest::new(base.clone(), vec![second, third])
        .with_sheet(SheetMergeConfig::new("Sales", 5))
        .with_sheet(SheetMergeConfig::disabled("Notes"));
    let orchestrator = MergeOrchestrator::new(opener());
    let mut sink = XlsxSink::new();

    let result = orchestrator
        .merge(&request, &mut sink)
        .expect("merge should succeed");
    sink.save(&output).expect("should save output");

    assert_eq!(result.total_rows, 16);
    assert_eq!(result.processed_sheets, 1);
    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(sink.sheet_names(), ["Sales".to_string()]);

    let merged = read_back(&output, "Sales");
    assert_eq!(merged.len(), 21);
    assert_eq!(merged[..5].to_vec(), sales_header());
    assert_eq!(merged[5], row(&["b-0", "Shuzzi", "0"]));
    assert_eq!(merged[13], row(&["c-0", "Shuzzi", "0"]));
    assert_eq!(merged[20], row(&["c-7", "Shuzzi", "70"]));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn marketplace_preset_merges_only_template_keys() {
    let temp_dir = unique_test_dir("merge-marketplace");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let base = temp_dir.join("base.xlsx");
    let extra = temp_dir.join("extra.xlsx");
    let output = temp_dir.join("merged.xlsx");

    let decoration = || vec![row(&["Ozon"]), row(&["v2"]), row(&["required fields"])];
    let template_header = row(&["Артикул*", "Название", "Бренд в одежде и обуви*"]);
    let video_header = row(&["Артикул*", "Ссылка на видео"]);
    let sheet = |header: &Row, data: Vec<Row>| {
        let mut rows = decoration();
        rows.push(header.clone());
        rows.extend(data);
        rows
    };

    write_fixture(
        &base,
        &[
            ("Инструкция", vec![row(&["read me"])]),
            (
                MARKETPLACE_TEMPLATE_SHEET,
                sheet(
                    &template_header,
                    vec![row(&["A-1", "boots", "Shuzzi"]), row(&["A-2", "hat", "Other"])],
                ),
            ),
            (
                MARKETPLACE_VIDEO_SHEET,
                sheet(&video_header, vec![row(&["A-1", "https://v/1"])]),
            ),
        ],
    );
    write_fixture(
        &extra,
        &[
            (
                MARKETPLACE_TEMPLATE_SHEET,
                sheet(&template_header, vec![row(&["A-3", "coat", " shuzzi "])]),
            ),
            (
                MARKETPLACE_VIDEO_SHEET,
                sheet(
                    &video_header,
                    vec![
                        row(&["A-2", "https://v/2"]),
                        row(&["A-3", "https://v/3"]),
                        row(&["", ""]),
                    ],
                ),
            ),
        ],
    );

    let analyzer = BaseAnalyzer::new(opener());
    let mut configs = analyzer
        .default_sheet_configs(&base)
        .expect("should list base sheets");
    analyzer
        .apply_preset(
            &base,
            &mut configs,
            &Preset::marketplace_template(vec!["Shuzzi".to_string()]),
        )
        .expect("should apply preset");

    let mut request = MergeRequest::new(base.clone(), vec![extra]);
    request.sheet_configs = configs;
    let mut sink = XlsxSink::new();
    let result = MergeOrchestrator::new(opener())
        .merge(&request, &mut sink)
        .expect("merge should succeed");
    sink.save(&output).expect("should save output");

    assert_eq!(result.processed_sheets, 2);
    assert_eq!(result.sheet_stats[MARKETPLACE_TEMPLATE_SHEET].rows_merged, 2);
    assert_eq!(result.sheet_stats[MARKETPLACE_VIDEO_SHEET].rows_merged, 2);
    assert_eq!(
        sink.sheet_names(),
        [MARKETPLACE_TEMPLATE_SHEET.to_string(), MARKETPLACE_VIDEO_SHEET.to_string()]
    );

    let videos = read_back(&output, MARKETPLACE_VIDEO_SHEET);
    assert_eq!(videos.len(), 6);
    assert_eq!(videos[3], video_header);
    assert_eq!(videos[4], row(&["A-1", "https://v/1"]));
    assert_eq!(videos[5], row(&["A-3", "https://v/3"]));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn worker_reports_progress_and_returns_sink() {
    let temp_dir = unique_test_dir("worker");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let base = temp_dir.join("A.xlsx");
    let second = temp_dir.join("B.xlsx");
    write_fixture(&base, &[("Sales", sales_header())]);
    write_fixture(&second, &[("Sales", sales_rows("b"))]);

    let request = MergeRequest::new(base, vec![second, temp_dir.join("gone.xlsx")])
        .with_sheet(SheetMergeConfig::new("Sales", 5));
    let job = spawn_merge(opener(), request, XlsxSink::new(), 1).expect("should spawn worker");

    let updates: Vec<ProgressUpdate> = job.progress().iter().collect();
    let (result, sink) = job.wait().expect("merge should succeed");

    assert_eq!(updates.len(), 3);
    assert_eq!(updates.last().map(|u| (u.current, u.total)), Some((3, 3)));
    assert_eq!(result.total_rows, 8);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].starts_with("cannot open gone.xlsx"));
    assert_eq!(sink.sheet_names(), ["Sales".to_string()]);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn worker_wait_does_not_need_progress_to_be_drained() {
    let temp_dir = unique_test_dir("worker-undrained");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let base = temp_dir.join("A.xlsx");
    write_fixture(&base, &[("Sales", sales_rows("a"))]);

    let files = vec![base.clone(), base.clone(), base.clone()];
    let request =
        MergeRequest::new(base, files).with_sheet(SheetMergeConfig::new("Sales", 5));
    let job = spawn_merge(opener(), request, XlsxSink::new(), 1).expect("should spawn worker");

    let (result, _) = job.wait().expect("merge should succeed");

    assert_eq!(result.total_rows, 32);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn worker_surfaces_fatal_errors() {
    let temp_dir = unique_test_dir("worker-fatal");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");

    let request = MergeRequest::new(temp_dir.join("missing.xlsx"), Vec::new())
        .with_sheet(SheetMergeConfig::new("Sales", 1));
    let job = spawn_merge(opener(), request, XlsxSink::new(), 4).expect("should spawn worker");

    let err = job.wait().err().expect("merge should fail");

    assert_eq!(err.code(), ErrorCode::FileNotFound);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

fn sample_profile(name: &str) -> Profile {
    let mut profile = Profile::new(name);
    profile.base_file_name = "base.xlsx".to_string();
    profile.add_sheet(SheetMergeConfig::template("Шаблон", 4).with_filter(2, vec!["Shuzzi".into()]));
    profile.add_sheet(SheetMergeConfig::new("Озон.Видео", 4).with_extracted_keys());
    profile
}

#[test]
fn profile_store_saves_and_loads() {
    let temp_dir = unique_test_dir("profile-roundtrip");
    let store = JsonProfileStore::new(temp_dir.join("profiles")).expect("should create store");
    let mut profile = sample_profile("weekly");
    profile.created_at = None;

    let path = store
        .save(&mut profile, "weekly.json")
        .expect("should save profile");
    let loaded = store.load("weekly").expect("should load profile");

    assert_eq!(path, store.dir().join("weekly.json"));
    assert!(profile.created_at.is_some());
    assert_eq!(loaded, profile);
    assert!(store.exists("weekly"));
    assert!(store.exists("weekly.json"));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn profile_store_rejects_invalid_profiles() {
    let temp_dir = unique_test_dir("profile-invalid");
    let store = JsonProfileStore::new(&temp_dir).expect("should create store");
    let mut profile = sample_profile("broken");
    profile.base_file_name.clear();

    let err = store.save(&mut profile, "broken").expect_err("should reject");

    assert!(matches!(err, ProfileError::Invalid(ConfigError::EmptyBaseFile)));
    assert!(!store.exists("broken"));
    assert!(matches!(store.load("broken"), Err(ProfileError::NotFound(_))));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn profile_store_lists_corrupt_files() {
    let temp_dir = unique_test_dir("profile-list");
    let store = JsonProfileStore::new(&temp_dir).expect("should create store");
    store
        .save(&mut sample_profile("good"), "good")
        .expect("should save profile");
    fs::write(temp_dir.join("bad.json"), "{ not json").expect("should write bad file");
    fs::write(temp_dir.join("readme.txt"), "ignored").expect("should write text file");
    fs::create_dir_all(temp_dir.join("nested.json")).expect("should create dir");

    let listed = store.list().expect("should list profiles");

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].file_name, "bad");
    assert!(listed[0].is_corrupt);
    assert_eq!(listed[1].file_name, "good");
    assert!(!listed[1].is_corrupt);
    assert_eq!(listed[1].sheets_count, 2);
    assert_eq!(listed[1].base_file, "base.xlsx");
    assert!(listed[1].modified_at.is_some());
    assert!(listed[1].size > 0);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn profile_store_exports_imports_and_deletes() {
    let temp_dir = unique_test_dir("profile-transfer");
    let store = JsonProfileStore::new(temp_dir.join("profiles")).expect("should create store");
    let exported_dir = temp_dir.join("exported");
    fs::create_dir_all(&exported_dir).expect("should create export dir");
    store
        .save(&mut sample_profile("shared"), "shared")
        .expect("should save profile");

    let exported = store
        .export("shared", &exported_dir)
        .expect("should export profile");
    store.delete("shared").expect("should delete profile");
    assert!(!store.exists("shared"));
    assert!(matches!(store.delete("shared"), Err(ProfileError::NotFound(_))));

    let imported = store.import(&exported).expect("should import profile");

    assert_eq!(exported, exported_dir.join("shared.json"));
    assert_eq!(imported.profile_name, "shared");
    assert!(store.exists("shared"));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn profile_store_keeps_file_names_inside_its_directory() {
    let temp_dir = unique_test_dir("profile-names");
    let store = JsonProfileStore::new(temp_dir.join("profiles")).expect("should create store");
    let outside = temp_dir.join("escape.json");
    fs::write(&outside, "{}").expect("should write outside file");

    assert!(matches!(store.load("../escape"), Err(ProfileError::InvalidName(_))));
    assert!(matches!(store.delete("../escape"), Err(ProfileError::InvalidName(_))));
    assert!(matches!(store.delete("..\\escape"), Err(ProfileError::InvalidName(_))));
    assert!(matches!(
        store.save(&mut sample_profile("nested"), "sub/nested"),
        Err(ProfileError::InvalidName(_))
    ));
    assert!(matches!(
        store.export("..", &temp_dir),
        Err(ProfileError::InvalidName(_))
    ));
    assert!(matches!(store.load(""), Err(ProfileError::InvalidName(_))));
    assert!(!store.exists("../escape"));
    assert_eq!(
        fs::read_to_string(&outside).expect("outside file should survive"),
        "{}"
    );
    assert!(!temp_dir.join("profiles").join("sub").exists());

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn saved_profile_drives_a_merge() {
    let temp_dir = unique_test_dir("profile-merge");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let store = JsonProfileStore::new(temp_dir.join("profiles")).expect("should create store");
    let base = temp_dir.join("A.xlsx");
    let second = temp_dir.join("B.xlsx");
    write_fixture(&base, &[("Sales", sales_header())]);
    write_fixture(&second, &[("Sales", sales_rows("b"))]);

    let mut profile = Profile::new("sales");
    profile.base_file_name = "A.xlsx".to_string();
    profile.add_sheet(SheetMergeConfig::new("Sales", 5).with_filter(0, vec!["B-1".into()]));
    store.save(&mut profile, "sales").expect("should save profile");
    let loaded = store.load("sales").expect("should load profile");

    let request = MergeRequest::new(base, vec![second]).with_sheets(loaded.sheets);
    let mut sink = XlsxSink::new();
    let result = MergeOrchestrator::new(opener())
        .merge(&request, &mut sink)
        .expect("merge should succeed");

    assert_eq!(result.total_rows, 1);
    assert_eq!(result.sheet_stats["Sales"].files_count, 2);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}
