use budget_unifier::layout::{COL_A, COL_B, COL_C, COL_D, COL_G, COL_H, COL_I, COL_J};
use budget_unifier::model::{CellValue, Fill, Sheet, Workbook};
use budget_unifier::pipeline::{self, STAGES, Silent, StageContext};

const PARENT: &str = "D8ECF6";
const INPUT: &str = "F7F3DF";
const COMPOSITION: &str = "DFF0D8";

fn paint(sheet: &mut Sheet, row: u32, column: u32, color: &str) {
    sheet.cell_mut(row, column).expect("cell").style.fill = Fill::solid(color);
}

fn formula(sheet: &Sheet, row: u32, column: u32) -> Option<&str> {
    match sheet.value(row, column) {
        CellValue::Formula(text) => Some(text),
        _ => None,
    }
}

fn run_stage(context: &mut StageContext, name: &str) -> budget_unifier::pipeline::StageReport {
    pipeline::stage(name)
        .unwrap_or_else(|| panic!("stage {name} registered"))
        .execute(context)
}

fn synthetic_outline(levels: &[&str]) -> Sheet {
    let mut sheet = Sheet::new("Orçamento Sintético");
    for (offset, code) in levels.iter().enumerate() {
        let row = 5 + offset as u32;
        sheet.set_value(row, COL_A, *code).expect("code");
        sheet.set_value(row, COL_I, 10.0).expect("total");
        sheet.set_value(row, COL_J, 12.5).expect("total with BDI");
        paint(&mut sheet, row, COL_A, PARENT);
    }
    sheet
}

#[test]
fn stages_run_in_a_fixed_progress_order() {
    assert_eq!(STAGES.len(), 26);
    assert_eq!(STAGES[0].name, "unmerge_all");
    assert_eq!(STAGES[STAGES.len() - 1].name, "hierarchy_codes");
    for pair in STAGES.windows(2) {
        assert!(pair[0].percent <= pair[1].percent, "{:?} then {:?}", pair[0], pair[1]);
        assert_ne!(pair[0].name, pair[1].name);
    }
    assert!(STAGES.iter().all(|stage| (40..=92).contains(&stage.percent)));
}

#[test]
fn parents_sum_their_direct_children() {
    let mut workbook = Workbook::new();
    workbook.add_sheet(synthetic_outline(&["1", "1.1", "1.2", "1.2.1", "2"]));
    let mut context = StageContext::new(workbook);

    let report = run_stage(&mut context, "synthetic_hierarchy");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let sheet = context.workbook.sheet(0).expect("sheet");
    assert_eq!(formula(sheet, 5, COL_I), Some("=SUM(I6:I7)"));
    assert_eq!(formula(sheet, 5, COL_J), Some("=SUM(J6:J7)"));
    assert_eq!(formula(sheet, 7, COL_I), Some("=SUM(I8)"));
    assert_eq!(report.formulas, 4);
}

#[test]
fn parent_without_children_keeps_its_value() {
    let mut workbook = Workbook::new();
    workbook.add_sheet(synthetic_outline(&["1", "1.1", "1.2", "1.2.1", "2"]));
    let mut context = StageContext::new(workbook);
    run_stage(&mut context, "synthetic_hierarchy");

    let sheet = context.workbook.sheet(0).expect("sheet");
    assert_eq!(sheet.value(9, COL_I), &CellValue::Number(10.0));
    assert_eq!(sheet.value(9, COL_J), &CellValue::Number(12.5));
    assert_eq!(sheet.value(8, COL_I), &CellValue::Number(10.0));
}

fn lookup_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    workbook.add_sheet(Sheet::new("Composições com Preço Unitário"));

    let mut abc = Sheet::new("Curva ABC de Insumos");
    for (row, code, bank, description) in [
        (5, "100", "SINAPI", "CIMENTO"),
        (6, "200", "SINAPI", "AREIA"),
        (7, "100", "ORSE", "CIMENTO CP-II"),
    ] {
        abc.set_value(row, COL_A, code).expect("code");
        abc.set_value(row, COL_B, bank).expect("bank");
        abc.set_value(row, COL_C, description).expect("description");
    }
    workbook.add_sheet(abc);

    let mut synthetic = Sheet::new("Orçamento Sintético");
    for (row, code, description, color) in [
        (5, "100", "CIMENTO", INPUT),
        (6, "200", "AREIA", INPUT),
        (7, "C-01", "ALVENARIA", COMPOSITION),
        (8, "300", "SEM COR", ""),
    ] {
        synthetic.set_value(row, COL_B, code).expect("code");
        synthetic.set_value(row, COL_D, description).expect("description");
        if !color.is_empty() {
            paint(&mut synthetic, row, COL_G, color);
        }
    }
    workbook.add_sheet(synthetic);
    workbook
}

#[test]
fn ambiguous_codes_are_looked_up_by_description() {
    let mut context = StageContext::new(lookup_workbook());
    run_stage(&mut context, "abc_ambiguity_scan");
    assert_eq!(context.ambiguous.iter().collect::<Vec<_>>(), vec!["100"]);

    let report = run_stage(&mut context, "synthetic_price_lookups");
    assert_eq!(report.formulas, 3);

    let sheet = context.workbook.sheet(2).expect("synthetic");
    assert_eq!(
        formula(sheet, 5, COL_G),
        Some(
            "=IFERROR(INDEX('Curva ABC de Insumos'!$G:$G,MATCH(D5,'Curva ABC de Insumos'!$C:$C,0)),0)"
        )
    );
    assert_eq!(
        formula(sheet, 6, COL_G),
        Some("=IFERROR(VLOOKUP(B6,'Curva ABC de Insumos'!$A:$G,7,FALSE),0)")
    );
    assert_eq!(
        formula(sheet, 7, COL_G),
        Some("=IFERROR(VLOOKUP(B7,'Composições com Preço Unitário'!$B:$H,7,FALSE),0)")
    );
    assert_eq!(formula(sheet, 8, COL_G), None);
}

#[test]
fn ambiguity_is_computed_once() {
    let mut context = StageContext::new(lookup_workbook());
    run_stage(&mut context, "abc_ambiguity_scan");

    let abc = context.workbook.sheet_mut(1).expect("abc");
    abc.delete_rows(7, 1);
    run_stage(&mut context, "synthetic_price_lookups");

    let sheet = context.workbook.sheet(2).expect("synthetic");
    assert!(formula(sheet, 5, COL_G).is_some_and(|text| text.contains("INDEX(")));
}

#[test]
fn composition_inputs_use_placeholders_on_failure() {
    let mut workbook = lookup_workbook();
    let compositions = workbook.sheet_mut(0).expect("compositions");
    for (row, code) in [(4, "100"), (5, "200")] {
        compositions.set_value(row, COL_A, "Insumo").expect("kind");
        compositions.set_value(row, COL_B, code).expect("code");
        paint(compositions, row, COL_H, "EFEFEF");
    }
    let mut context = StageContext::new(workbook);
    run_stage(&mut context, "abc_ambiguity_scan");
    run_stage(&mut context, "compositions_input_lookups");

    let sheet = context.workbook.sheet(0).expect("compositions");
    let by_description = formula(sheet, 4, COL_H).expect("row 4 formula");
    assert!(by_description.contains("MATCH(D4,"));
    assert!(by_description.ends_with(",\"Descrição não encontrada\")"));
    let by_code = formula(sheet, 5, COL_H).expect("row 5 formula");
    assert!(by_code.starts_with("=IFERROR(VLOOKUP(B5,"));
    assert!(by_code.ends_with(",\"Código não encontrado\")"));
}

#[test]
fn auxiliary_compositions_link_by_normalized_key() {
    let mut workbook = Workbook::new();
    let mut compositions = Sheet::new("Composições com Preço Unitário");
    compositions.set_value(3, COL_B, 87503.0).expect("priced key");
    paint(&mut compositions, 3, COL_H, COMPOSITION);
    compositions.set_value(9, COL_B, " 87503 ").expect("auxiliary key");
    paint(&mut compositions, 9, COL_H, "D6D6D6");
    compositions.set_value(10, COL_B, "  chapisco   traço ").expect("auxiliary key");
    paint(&mut compositions, 10, COL_H, "D6D6D6");
    compositions.set_value(12, COL_B, "CHAPISCO TRAÇO").expect("priced key");
    paint(&mut compositions, 12, COL_H, COMPOSITION);
    workbook.add_sheet(compositions);

    let mut context = StageContext::new(workbook);
    let report = run_stage(&mut context, "compositions_auxiliary_links");

    let sheet = context.workbook.sheet(0).expect("compositions");
    assert_eq!(formula(sheet, 9, COL_H), Some("=I3"));
    assert_eq!(formula(sheet, 10, COL_H), Some("=I12"));
    assert_eq!(formula(sheet, 3, COL_H), None);
    assert!(report.warnings.is_empty());
}

#[test]
fn missing_sheets_skip_their_stages() {
    let mut workbook = Workbook::new();
    let mut only = Sheet::new("Composições com Preço Unitário");
    only.set_value(3, COL_A, "Composição").expect("kind");
    workbook.add_sheet(only);

    let (_workbook, report) = pipeline::run(workbook, &mut Silent);

    assert_eq!(report.stages.len(), STAGES.len());
    for name in ["abc_prepare", "synthetic_prepare", "synthetic_weights", "abc_links"] {
        let stage = report.stage(name).expect("stage reported");
        assert!(stage.skipped, "{name} should be skipped");
        assert!(!stage.warnings.is_empty());
    }
    assert!(!report.stage("compositions_prepare").expect("stage").skipped);
    assert!(report.ambiguous_codes.is_empty());
}

#[test]
fn abc_totals_without_items_keep_every_row() {
    let mut workbook = Workbook::new();
    workbook.add_sheet(Sheet::new("Composições com Preço Unitário"));
    let mut abc = Sheet::new("Curva ABC de Insumos");
    for row in 5..=9 {
        abc.set_value(row, COL_A, format!("{row}")).expect("code");
    }
    workbook.add_sheet(abc);
    let mut context = StageContext::new(workbook);

    let totals = run_stage(&mut context, "abc_totals");
    let share = run_stage(&mut context, "abc_share_total");

    assert_eq!(totals.warnings.len(), 1);
    assert_eq!(share.warnings.len(), 1);
    assert!(!totals.skipped && !share.skipped);
    assert_eq!(context.workbook.sheet(1).expect("abc").max_row(), 9);
}

#[test]
fn weights_need_the_grand_total() {
    let mut workbook = Workbook::new();
    let mut synthetic = synthetic_outline(&["1", "1.1"]);
    paint(&mut synthetic, 5, COL_J, PARENT);
    workbook.add_sheet(synthetic);
    let mut context = StageContext::new(workbook);

    let report = run_stage(&mut context, "synthetic_weights");

    assert_eq!(report.formulas, 0);
    assert!(report.warnings.iter().any(|warning| warning.message.contains("Total Geral")));
}

#[test]
fn weights_divide_by_the_grand_total() {
    let mut workbook = Workbook::new();
    let mut synthetic = synthetic_outline(&["1", "1.1"]);
    paint(&mut synthetic, 6, COL_J, INPUT);
    synthetic.set_value(8, COL_I, "Total sem BDI").expect("label");
    synthetic.set_value(9, COL_I, "Total do BDI").expect("label");
    synthetic.set_value(10, COL_I, "Total Geral").expect("label");
    synthetic.set_value(10, COL_J, "=SUM(J5)").expect("grand total");
    workbook.add_sheet(synthetic);
    let mut context = StageContext::new(workbook);

    let report = run_stage(&mut context, "synthetic_weights");
    let sheet = context.workbook.sheet(0).expect("sheet");

    assert_eq!(sheet.text(10, COL_G), "Total Geral");
    assert_eq!(formula(sheet, 10, COL_H), Some("=SUM(J5)"));
    assert_eq!(formula(sheet, 9, COL_H), Some("=H10-H8"));
    assert_eq!(formula(sheet, 6, 11), Some("=J6/$H$10"));
    assert_eq!(sheet.cell(6, 11).expect("weight").style.number_format, "0.00%");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn hierarchy_codes_are_rewritten_as_text() {
    let mut workbook = Workbook::new();
    let mut synthetic = Sheet::new("Orçamento Sintético");
    synthetic.set_value(5, COL_A, 2.0).expect("number code");
    synthetic.set_value(6, COL_A, "2 , 1").expect("comma code");
    synthetic.set_value(7, COL_A, "2.2").expect("clean code");
    workbook.add_sheet(synthetic);
    let mut context = StageContext::new(workbook);

    run_stage(&mut context, "hierarchy_codes");
    let sheet = context.workbook.sheet(0).expect("sheet");

    assert_eq!(sheet.value(5, COL_A), &CellValue::Text("2".into()));
    assert_eq!(sheet.value(6, COL_A), &CellValue::Text("2.1".into()));
    assert_eq!(sheet.cell(6, COL_A).expect("cell").style.number_format, "@");
    assert_eq!(sheet.cell(7, COL_A).expect("cell").style.number_format, "General");
}
