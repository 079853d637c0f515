
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use note_columns::{*};

pub fn column_benchmarks(c: &mut Criterion) {

    //Build a collection with enough notes that per-row work shows up in the numbers
    let collection = Collection::open_in_memory().unwrap();
    collection.add_template(&NoteTemplate::new(1414296099999, "Basic", &["Front", "Back", "Extra"])).unwrap();

    let mut a_card = None;
    for i in 0..1000i64 {
        let front = format!("<b>note {i}</b> &amp; some markup");
        let (_note, card) = collection
            .add_note(TemplateId(1414296099999), &[&front, "back text", "extra text"], &["bench"])
            .unwrap();
        collection.add_review(card, 1_600_000_000_000 + i * 60_000, 2500).unwrap();
        a_card = Some(card);
    }
    let card = a_card.unwrap();

    let browser = BrowserColumns::new(collection).unwrap();
    let catalog = browser.catalog();
    let front = catalog.iter().find(|col| col.column_type == "_field_Front").unwrap();
    let first_review = catalog.iter().find(|col| col.column_type == "cfirst").unwrap();

    //The stripper runs once per visible row per field column, so it's the hottest path
    c.bench_function("strip_markup", |b| b.iter(|| black_box(
        strip("<b>Hi</b> &amp; <i>bye</i> caf&eacute; &#x41;")
    )));

    c.bench_function("display_field", |b| b.iter(|| black_box(
        browser.display(front, card).unwrap()
    )));

    //Sorting by a field column evaluates the registered scalar function per row
    c.bench_function("sort_by_field", |b| b.iter(|| black_box(
        browser.cards_sorted_by(front).unwrap().len()
    )));

    c.bench_function("sort_by_first_review", |b| b.iter(|| black_box(
        browser.cards_sorted_by(first_review).unwrap().len()
    )));

    //The context menu re-reads the template catalog and rebuilds the index every open
    c.bench_function("context_menu", |b| b.iter(|| black_box(
        browser.context_menu().unwrap().fields.len()
    )));
}

criterion_group!(benches, column_benchmarks);
criterion_main!(benches);
