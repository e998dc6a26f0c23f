use std::path::{Path, PathBuf};

use budget_unifier::UnifyError;
use budget_unifier::color::{ColorClass, class_at};
use budget_unifier::consolidate::{self, ConsolidationRequest};
use budget_unifier::io::{excel_read, excel_write};
use budget_unifier::layout::TARGET_SHEET_TITLES;
use budget_unifier::model::{CellValue, Fill, Font, Sheet, Workbook};
use calamine::{Range, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Color, Format, Workbook as XlsxWorkbook, Worksheet};
use tempfile::tempdir;

const BLUE: u32 = 0x0000FF;
const GREEN: u32 = 0xDFF0D8;
const GREY: u32 = 0xEFEFEF;
const CREAM: u32 = 0xF7F3DF;
const SKY: u32 = 0xD8ECF6;

fn fill(color: u32) -> Format {
    Format::new().set_background_color(Color::RGB(color))
}

/// Writes text or a number at a 1-based position.
fn put(sheet: &mut Worksheet, row: u32, column: u16, value: &str) {
    let (row, column) = (row - 1, column - 1);
    match value.parse::<f64>() {
        Ok(number) if !value.contains(',') => {
            sheet.write_number(row, column, number).expect("number written");
        }
        _ => {
            sheet.write_string(row, column, value).expect("text written");
        }
    }
}

fn paint(sheet: &mut Worksheet, row: u32, columns: &[u16], color: u32) {
    for column in columns {
        sheet
            .write_blank(row - 1, column - 1, &fill(color))
            .expect("fill written");
    }
}

/// Writes `value` over a painted cell, keeping the fill.
fn put_painted(sheet: &mut Worksheet, row: u32, column: u16, value: &str, color: u32) {
    let (row, column) = (row - 1, column - 1);
    match value.parse::<f64>() {
        Ok(number) => sheet.write_number_with_format(row, column, number, &fill(color)),
        Err(_) => sheet.write_string_with_format(row, column, value, &fill(color)),
    }
    .expect("painted value written");
}

fn save(workbook: &mut XlsxWorkbook, path: &Path) {
    workbook.save(path).expect("input workbook saved");
}

/// Unit-price composition export: two banner rows, a title band, one
/// composition with two inputs and the auxiliary section header.
fn write_compositions(path: &Path) {
    let mut workbook = XlsxWorkbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Relatorio").expect("name");
    put(sheet, 1, 1, "Empresa Exemplo");
    put(sheet, 2, 1, "Obra: Escola Municipal");
    put_painted(sheet, 3, 1, "Composições Analíticas com Preço Unitário", BLUE);
    put(sheet, 4, 1, "Tipo");

    let lines = [
        (5, "Composição", "C-01", "ALVENARIA", "1", GREEN),
        (6, "Insumo", "100", "CIMENTO", "2", GREY),
        (7, "Insumo", "200", "AREIA", "3", GREY),
    ];
    for (row, kind, code, description, quantity, color) in lines {
        paint(sheet, row, &[5, 6, 7, 9, 10], color);
        put_painted(sheet, row, 1, kind, color);
        put_painted(sheet, row, 2, code, color);
        put_painted(sheet, row, 3, "SINAPI", color);
        put_painted(sheet, row, 4, description, color);
        put_painted(sheet, row, 8, quantity, color);
    }
    put(sheet, 8, 1, "Composições Auxiliares");
    save(&mut workbook, path);
}

/// ABC export: one code priced by two banks.
fn write_abc(path: &Path) {
    let mut workbook = XlsxWorkbook::new();
    let sheet = workbook.add_worksheet();
    put(sheet, 1, 5, "SINAPI - 01/2024");
    put(sheet, 2, 5, "ORSE - 01/2024");
    put_painted(sheet, 3, 1, "Curva ABC de Insumos", BLUE);
    for (column, header) in [(1, "Código"), (2, "Banco"), (4, "Descrição"), (7, "Quant."), (9, "Valor"), (11, "Total"), (14, "%")] {
        put(sheet, 4, column, header);
    }
    put(sheet, 5, 1, "Insumos");

    let items = [
        (6, "100", "SINAPI", "CIMENTO", "10,5", "30"),
        (7, "200", "SINAPI", "AREIA", "4", "20"),
        (8, "100", "ORSE", "CIMENTO CP-II", "1", "31"),
    ];
    for (row, code, bank, description, quantity, price) in items {
        put(sheet, row, 1, code);
        put(sheet, row, 2, bank);
        put(sheet, row, 4, description);
        put(sheet, row, 7, quantity);
        put_painted(sheet, row, 9, price, CREAM);
        paint(sheet, row, &[11, 14], CREAM);
    }
    save(&mut workbook, path);
}

/// Synthetic budget export: one outline parent with three priced lines and
/// the footer labels.
fn write_synthetic(path: &Path) {
    let mut workbook = XlsxWorkbook::new();
    let sheet = workbook.add_worksheet();
    put(sheet, 1, 1, "Obra: Escola Municipal");
    put(sheet, 1, 8, "BDI");
    put(sheet, 2, 8, "0.25");
    put_painted(sheet, 3, 1, "Orçamento Sintético", BLUE);
    for (column, header) in [(1, "Item"), (2, "Código"), (4, "Descrição"), (5, "Banco"), (6, "Quant.")] {
        put(sheet, 4, column, header);
    }
    put(sheet, 5, 1, "Subtítulo");

    put_painted(sheet, 6, 1, "1", SKY);
    put(sheet, 6, 4, "SERVIÇOS PRELIMINARES");
    paint(sheet, 6, &[15], SKY);

    let lines = [
        (7, "1.1", "100", "CIMENTO", "2", CREAM),
        (8, "1.2", "200", "AREIA", "3", CREAM),
        (9, "1.3", "C-01", "ALVENARIA", "1", GREEN),
    ];
    for (row, item, code, description, quantity, color) in lines {
        put(sheet, row, 1, item);
        put(sheet, row, 2, code);
        put(sheet, row, 4, description);
        put(sheet, row, 5, "SINAPI");
        put(sheet, row, 6, quantity);
        paint(sheet, row, &[7, 11, 12, 15], color);
    }
    put(sheet, 10, 12, "Total sem BDI");
    put(sheet, 11, 12, "Total do BDI");
    put(sheet, 12, 12, "Total Geral");
    save(&mut workbook, path);
}

fn write_inputs(directory: &Path) -> Vec<PathBuf> {
    let paths = vec![
        directory.join("cpu.xlsx"),
        directory.join("abc.xlsx"),
        directory.join("sintetico.xlsx"),
    ];
    write_compositions(&paths[0]);
    write_abc(&paths[1]);
    write_synthetic(&paths[2]);
    paths
}

fn formulas(path: &Path, sheet: &str) -> Range<String> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("output opened");
    workbook
        .worksheet_formula(sheet)
        .expect("sheet present")
        .expect("formulas read")
}

/// Formula text at an A1-style position, without the leading `=`.
fn formula_at<'a>(range: &'a Range<String>, row: u32, column: u32) -> &'a str {
    range
        .get_value((row - 1, column - 1))
        .map(String::as_str)
        .unwrap_or("")
}

#[test]
fn consolidation_links_the_three_sheets() {
    let directory = tempdir().expect("temporary directory");
    let inputs = write_inputs(directory.path());
    let output = directory.path().join("out").join("consolidada.xlsx");

    let mut percents = Vec::new();
    let mut record = |percent: u8, _message: &str| percents.push(percent);
    let outcome = consolidate::consolidate(&inputs, &output, &mut record).expect("consolidated");

    assert_eq!(outcome.output, output);
    assert_eq!(outcome.report.ambiguous_codes, vec!["100".to_string()]);
    assert!(outcome.report.formula_count() > 0);
    assert_eq!(percents.first(), Some(&5));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));

    let workbook: Xlsx<_> = open_workbook(&output).expect("output opened");
    assert_eq!(workbook.sheet_names(), TARGET_SHEET_TITLES.map(String::from).to_vec());

    let synthetic = formulas(&output, TARGET_SHEET_TITLES[2]);
    assert!(
        formula_at(&synthetic, 6, 7)
            .contains("INDEX('Curva ABC de Insumos'!$G:$G,MATCH(D6,'Curva ABC de Insumos'!$C:$C,0))")
    );
    assert_eq!(
        formula_at(&synthetic, 7, 7),
        "IFERROR(VLOOKUP(B7,'Curva ABC de Insumos'!$A:$G,7,FALSE),0)"
    );
    assert_eq!(
        formula_at(&synthetic, 8, 7),
        "IFERROR(VLOOKUP(B8,'Composições com Preço Unitário'!$B:$H,7,FALSE),0)"
    );
    assert_eq!(formula_at(&synthetic, 6, 8), "TRUNC((G6*(1+$G$2)),2)");
    assert_eq!(formula_at(&synthetic, 5, 9), "SUM(I6:I8)");
    assert_eq!(formula_at(&synthetic, 5, 10), "SUM(J6:J8)");
    assert_eq!(formula_at(&synthetic, 11, 8), "SUM(J5)");
    assert_eq!(formula_at(&synthetic, 6, 11), "J6/$H$11");

    let compositions = formulas(&output, TARGET_SHEET_TITLES[0]);
    assert_eq!(formula_at(&compositions, 3, 8), "SUM(I4:I5)");
    assert!(formula_at(&compositions, 4, 8).contains("MATCH(D4,"));
    assert!(formula_at(&compositions, 5, 8).starts_with("IFERROR(VLOOKUP(B5,"));
    assert_eq!(formula_at(&compositions, 4, 9), "TRUNC((G4*H4),2)");

    let abc = formulas(&output, TARGET_SHEET_TITLES[1]);
    assert_eq!(formula_at(&abc, 5, 7), "J5*(1-K5)");
    assert_eq!(formula_at(&abc, 8, 8), "SUM(H5:H7)");
    assert_eq!(formula_at(&abc, 5, 9), "H5/$H$8");
    assert_eq!(formula_at(&abc, 2, 9), "'Orçamento Sintético'!H11");
}

#[test]
fn ambiguous_codes_never_point_at_a_bank_row() {
    let directory = tempdir().expect("temporary directory");
    let inputs = write_inputs(directory.path());
    let output = directory.path().join("consolidada.xlsx");
    consolidate::consolidate(&inputs, &output, &mut |_: u8, _: &str| {}).expect("consolidated");

    let marker = "'Curva ABC de Insumos'!";
    for title in TARGET_SHEET_TITLES {
        let range = formulas(&output, title);
        for (_, _, formula) in range.used_cells() {
            for reference in formula.split(marker).skip(1) {
                let column: Vec<char> = reference.chars().take(3).collect();
                assert_eq!(column.first(), Some(&'$'), "{formula}");
                assert_eq!(column.get(2), Some(&':'), "{formula}");
            }
        }
    }
}

#[test]
fn background_worker_reports_progress_and_releases_the_workbook() {
    let directory = tempdir().expect("temporary directory");
    let inputs = write_inputs(directory.path());
    let output = directory.path().join("worker.xlsx");

    let handle = consolidate::spawn_consolidation(ConsolidationRequest {
        inputs,
        output: output.clone(),
    });
    let events: Vec<_> = handle.events().iter().collect();
    let outcome = handle.join().expect("worker finished");

    assert!(output.is_file());
    assert_eq!(outcome.output, output);
    assert_eq!(events.last().map(|event| event.percent), Some(100));
    assert!(events.iter().any(|event| event.message == "Computing weights"));
}

#[test]
fn worker_finishes_when_progress_is_never_read() {
    let directory = tempdir().expect("temporary directory");
    let inputs = write_inputs(directory.path());
    let output = directory.path().join("unread.xlsx");

    let handle = consolidate::spawn_consolidation(ConsolidationRequest {
        inputs,
        output: output.clone(),
    });
    let outcome = handle.join().expect("worker finished without a listener");

    assert_eq!(outcome.output, output);
    assert!(output.is_file());
}

#[test]
fn inputs_are_validated_before_loading() {
    let directory = tempdir().expect("temporary directory");
    let sheet = directory.path().join("a.xlsx");
    std::fs::write(&sheet, b"not read").expect("placeholder written");
    let text = directory.path().join("notes.csv");
    std::fs::write(&text, b"a;b").expect("csv written");
    let folder = directory.path().join("folder.xlsx");
    std::fs::create_dir(&folder).expect("folder created");
    let missing = directory.path().join("missing.xlsx");

    let error = consolidate::validate_inputs(&[sheet.clone(), sheet.clone(), missing]).unwrap_err();
    assert!(matches!(error, UnifyError::MissingInput(_)));

    let error = consolidate::validate_inputs(&[sheet.clone(), text, sheet.clone()]).unwrap_err();
    assert!(matches!(error, UnifyError::UnsupportedExtension { .. }));

    let error = consolidate::validate_input_file(&folder).unwrap_err();
    assert!(matches!(error, UnifyError::NotAFile(_)));

    let error = consolidate::validate_inputs(&[sheet]).unwrap_err();
    assert!(matches!(error, UnifyError::InputCount { .. }));
}

#[test]
fn written_sheets_read_back_with_styles_and_layout() {
    let directory = tempdir().expect("temporary directory");
    let path = directory.path().join("nested").join("styled.xlsx");

    let mut sheet = Sheet::new("Curva ABC de Insumos");
    let cell = sheet.cell_mut(5, 8).expect("cell");
    cell.value = CellValue::Number(12.5);
    cell.style.fill = Fill::solid("DFF0D8");
    cell.style.font = Font::bold().with_name("Arial");
    cell.style.number_format = "R$ #,##0.00".to_string();
    sheet.set_value(6, 8, "=SUM(H5)").expect("formula");
    sheet.set_value(1, 1, "Título").expect("title");
    sheet.merge("A1:C1").expect("merge");
    sheet.row_dimension_mut(2).height = Some(30.0);
    sheet.column_dimension_mut(4).hidden = true;
    sheet.column_dimension_mut(4).width = Some(12.0);

    let mut workbook = Workbook::new();
    workbook.add_sheet(sheet);
    excel_write::write_workbook(&path, &workbook).expect("workbook written");

    let read = excel_read::read_first_sheet(&path).expect("sheet read");
    assert_eq!(read.title, "Curva ABC de Insumos");
    assert_eq!(read.value(5, 8), &CellValue::Number(12.5));
    assert_eq!(read.value(6, 8), &CellValue::Formula("=SUM(H5)".to_string()));
    assert_eq!(read.text(1, 1), "Título");
    assert_eq!(class_at(&read, 5, 8), ColorClass::PrimaryComposition);

    let style = &read.cell(5, 8).expect("styled cell").style;
    assert!(style.font.bold);
    assert_eq!(style.font.name.as_deref(), Some("Arial"));
    assert_eq!(style.number_format, "R$ #,##0.00");

    let merges: Vec<String> = read.merged_ranges().iter().map(ToString::to_string).collect();
    assert_eq!(merges, vec!["A1:C1"]);
    assert_eq!(read.row_dimensions()[&2].height, Some(30.0));
    assert!(read.column_dimensions()[&4].hidden);
}
