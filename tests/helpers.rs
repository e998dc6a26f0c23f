use budget_unifier::codes::{AmbiguousCodes, LookupStrategy};
use budget_unifier::color::{ColorClass, canonical_hex, classify};
use budget_unifier::formula::{Fallback, Formula};
use budget_unifier::hierarchy::{OutlineRow, child_rows, parent_groups};
use budget_unifier::layout::{COL_A, COL_B, COL_H};
use budget_unifier::model::{CellRef, CellValue, Sheet, Workbook};
use budget_unifier::ranges::{collect_runs, expand_tokens, range_tokens};
use budget_unifier::text::{
    description_key, hierarchy_level, normalize_description, normalize_hierarchy_code,
    parse_localized_number,
};

#[test]
fn hierarchy_codes_normalize_to_dotted_text() {
    let code = |value: CellValue| normalize_hierarchy_code(&value);

    assert_eq!(code("3 , 2".into()), Some("3.2".to_string()));
    assert_eq!(code(5.into()), Some("5".to_string()));
    assert_eq!(code(5.0.into()), Some("5".to_string()));
    assert_eq!(code(5.1.into()), Some("5.1".to_string()));
    assert_eq!(code(" 2.1.3 ".into()), Some("2.1.3".to_string()));
    assert_eq!(code(CellValue::Empty), None);
}

#[test]
fn fractional_codes_use_six_significant_digits() {
    let code = |value: CellValue| normalize_hierarchy_code(&value);

    assert_eq!(code(1.2345678.into()), Some("1.23457".to_string()));
    assert_eq!(code(2.10.into()), Some("2.1".to_string()));
    assert_eq!(code(0.0001.into()), Some("0.0001".to_string()));
    assert_eq!(code(0.00001.into()), Some("1e-05".to_string()));
    assert_eq!(code(1234567.5.into()), Some("1.23457e+06".to_string()));
    assert_eq!(code(true.into()), Some("True".to_string()));
    assert_eq!(code(false.into()), Some("False".to_string()));
}

#[test]
fn hierarchy_level_counts_segments() {
    assert_eq!(hierarchy_level(&"1".into()), 1);
    assert_eq!(hierarchy_level(&"2.1.3".into()), 3);
    assert_eq!(hierarchy_level(&"4,2".into()), 2);
    assert_eq!(hierarchy_level(&7.into()), 1);
    assert_eq!(hierarchy_level(&"  ".into()), -1);
    assert_eq!(hierarchy_level(&CellValue::Empty), -1);
}

#[test]
fn description_normalization_is_idempotent() {
    let samples = [
        "  cimento   portland cp-ii ",
        "Areia\tmédia\nlavada",
        "",
        "JÁ NORMALIZADO",
        "mão de obra   (servente)",
    ];
    for sample in samples {
        let once = normalize_description(sample);
        assert_eq!(normalize_description(&once), once, "sample {sample:?}");
    }
    assert_eq!(
        normalize_description("  cimento   portland "),
        "CIMENTO PORTLAND"
    );
}

#[test]
fn description_keys_cover_every_value_kind() {
    assert_eq!(description_key(&" comp.  aux ".into()), "COMP. AUX");
    assert_eq!(description_key(&CellValue::Number(87503.0)), "87503");
    assert_eq!(description_key(&CellValue::Empty), "");
}

#[test]
fn localized_numbers_use_comma_decimals() {
    assert_eq!(parse_localized_number("12,5"), Some(12.5));
    assert_eq!(parse_localized_number(" 1.234,56 "), Some(1234.56));
    assert_eq!(parse_localized_number("42"), Some(42.0));
    assert_eq!(parse_localized_number("R$ 10"), None);
    assert_eq!(parse_localized_number(""), None);
}

#[test]
fn range_tokens_are_maximal_and_lossless() {
    let cases: [&[u32]; 5] = [
        &[5, 6, 7, 9],
        &[12],
        &[3, 4, 5, 6],
        &[2, 4, 6, 8],
        &[10, 11, 13, 14, 15, 20],
    ];
    for rows in cases {
        let tokens = range_tokens(COL_H, rows);
        assert_eq!(expand_tokens(&tokens), rows.to_vec());

        let runs = collect_runs(rows);
        for pair in runs.windows(2) {
            assert!(pair[0].end + 1 < pair[1].start, "runs {pair:?} are mergeable");
        }
    }
    assert_eq!(range_tokens(COL_H, &[5, 6, 7, 9]), vec!["H5:H7", "H9"]);
    assert!(range_tokens(COL_H, &[]).is_empty());
}

#[test]
fn ambiguity_ignores_scan_order() {
    let abc = |rows: &[(&str, &str)]| {
        let mut sheet = Sheet::new("Curva ABC de Insumos");
        for (offset, (code, bank)) in rows.iter().enumerate() {
            let row = 5 + offset as u32;
            sheet.set_value(row, COL_A, *code).expect("code");
            sheet.set_value(row, COL_B, *bank).expect("bank");
        }
        AmbiguousCodes::scan(&sheet)
    };

    for order in [
        [("100", "SINAPI"), ("100", "SINAPI"), ("100", "ORSE")],
        [("100", "ORSE"), ("100", "SINAPI"), ("100", "SINAPI")],
        [("100", "SINAPI"), ("100", "ORSE"), ("100", "SINAPI")],
    ] {
        let codes = abc(&order);
        assert!(codes.contains("100"));
        assert_eq!(codes.strategy_for("100"), LookupStrategy::ByDescription);
    }

    let codes = abc(&[("200", "SINAPI"), ("200", "SINAPI"), ("200", "SINAPI")]);
    assert!(codes.is_empty());
    assert_eq!(codes.strategy_for("200"), LookupStrategy::ByCode);
}

#[test]
fn palette_classifies_argb_and_rgb() {
    assert_eq!(canonical_hex("FFdff0d8"), Some("DFF0D8".to_string()));
    assert_eq!(canonical_hex("F7F3DF"), Some("F7F3DF".to_string()));
    assert_eq!(canonical_hex("theme"), None);

    assert_eq!(classify(Some("DFF0D8")), ColorClass::PrimaryComposition);
    assert_eq!(classify(Some("d8ecf6")), ColorClass::HierarchyParent);
    assert_eq!(classify(Some("0000FF")), ColorClass::HeaderBand);
    assert_eq!(classify(Some("123456")), ColorClass::None);
    assert_eq!(classify(None), ColorClass::None);
}

#[test]
fn lookups_render_whole_column_references() {
    let by_code = Formula::LookupByCode {
        key: CellRef::new(6, 2),
        sheet: "Curva ABC de Insumos".to_string(),
        first_column: 1,
        last_column: 7,
        fallback: Fallback::Zero,
    };
    assert_eq!(
        by_code.to_string(),
        "=IFERROR(VLOOKUP(B6,'Curva ABC de Insumos'!$A:$G,7,FALSE),0)"
    );

    let by_description = Formula::LookupByDescription {
        key: CellRef::new(6, 4),
        sheet: "Curva ABC de Insumos".to_string(),
        value_column: 7,
        match_column: 3,
        fallback: Fallback::Placeholder("Descrição não encontrada".to_string()),
    };
    assert_eq!(
        by_description.to_string(),
        "=IFERROR(INDEX('Curva ABC de Insumos'!$G:$G,MATCH(D6,'Curva ABC de Insumos'!$C:$C,0)),\"Descrição não encontrada\")"
    );

    let link = Formula::SheetReference {
        sheet: "Obra D'Ávila".to_string(),
        cell: CellRef::new(40, 8),
    };
    assert_eq!(link.to_string(), "='Obra D''Ávila'!H40");

    let share = Formula::Share {
        row: 5,
        column: 8,
        total: CellRef::new(40, 8),
    };
    assert_eq!(share.to_string(), "=H5/$H$40");
}

fn outline(levels: &[i32]) -> Vec<OutlineRow> {
    levels
        .iter()
        .enumerate()
        .map(|(index, level)| OutlineRow {
            row: index as u32 + 1,
            level: *level,
            parent: true,
        })
        .collect()
}

#[test]
fn outline_collects_direct_children_only() {
    let rows = outline(&[1, 2, 2, 3, 1]);
    assert_eq!(child_rows(&rows, 0), vec![2, 3]);
    assert_eq!(child_rows(&rows, 2), vec![4]);
    assert!(child_rows(&rows, 4).is_empty());

    let groups = parent_groups(&rows);
    assert_eq!(groups, vec![(1, vec![2, 3]), (3, vec![4])]);
}

#[test]
fn outline_skips_uncoded_rows_inside_a_block() {
    let rows = outline(&[1, -1, 2, -1, 2, 1]);
    assert_eq!(child_rows(&rows, 0), vec![3, 5]);
}

#[test]
fn deleting_rows_shifts_cells_and_merges() {
    let mut sheet = Sheet::new("Plan1");
    sheet.set_value(1, 1, "title").expect("title");
    sheet.set_value(5, 2, "kept").expect("kept");
    sheet.merge("A6:C6").expect("merge");
    sheet.merge("A2:B2").expect("merge");

    sheet.delete_rows(2, 2);

    assert_eq!(sheet.text(1, 1), "title");
    assert_eq!(sheet.text(3, 2), "kept");
    let merges: Vec<String> = sheet.merged_ranges().iter().map(ToString::to_string).collect();
    assert_eq!(merges, vec!["A4:C4"]);
}

#[test]
fn overlapping_merge_is_rejected() {
    let mut sheet = Sheet::new("Plan1");
    sheet.merge("A1:C2").expect("first merge");
    assert!(sheet.merge("B2:D3").is_err());
    assert_eq!(sheet.merged_ranges().len(), 1);
}

#[test]
fn sheet_titles_are_deduplicated_within_the_limit() {
    let mut workbook = Workbook::new();
    let long = "Composições com Preço Unitário e Serviços";
    let first = workbook.add_sheet(Sheet::new(long)).title.clone();
    assert_eq!(first.chars().count(), 31);

    let second = workbook.add_sheet(Sheet::new(long)).title.clone();
    assert!(second.ends_with("_2"));
    assert_eq!(second.chars().count(), 31);

    let third = workbook.add_sheet(Sheet::new("   ")).title.clone();
    assert_eq!(third, "Planilha");
}
