//! End-to-end extraction against the built-in pattern library.

use slipscan::{
    extract, extract_all, normalize, normalize_extraction, ErrorKind, ExtractionContext, Field,
    Method, PatternLibrary,
};
use url::Url;

const BOA_SLIP: &str = r#"<html><body>
<div class="slip">
  <p>Source Account Name: ABEBE KEBEDE TESFAYE</p>
  <p>Receiver Account: 4******72</p>
  <p>Receiver Name: ADDISU MELKIE ADMASU</p>
  <p>Transferred amount: ETB 6,950.00</p>
  <p>Transaction Date: 04/07/25 10:15</p>
  <p>Payment Reference: 47987614</p>
</div>
</body></html>"#;

fn boa_context(url: &str) -> (Url, Option<String>) {
    let parsed = Url::parse(url).unwrap();
    let id = slipscan::transaction_identifier(&parsed, &["trx".to_string()]);
    (parsed, id)
}

#[test]
fn test_boa_slip_fields() {
    let lib = PatternLibrary::builtin().unwrap();
    let (url, id) = boa_context("https://cs.bankofabyssinia.com/slip/?trx=FT25185N7TLH47987614");
    let profile = lib.resolve(&url);
    let ctx = ExtractionContext {
        url: url.as_str(),
        identifier: id.as_deref(),
    };

    let record = extract(BOA_SLIP, &profile, &ctx);
    assert_eq!(record.get(Field::Amount), Some("6950.00"));
    assert_eq!(record.get(Field::Currency), Some("ETB"));
    assert_eq!(record.get(Field::ReceiverAccount), Some("4******72"));
    assert_eq!(record.get(Field::ReceiverName), Some("ADDISU MELKIE ADMASU"));
    assert_eq!(record.get(Field::Date), Some("04/07/25 10:15"));
    assert_eq!(record.get(Field::Reference), Some("47987614"));
    assert_eq!(record.get(Field::TransactionId), Some("FT25185N7TLH47987614"));
    assert_eq!(record.get(Field::TransactionType), Some("Fund Transfer"));
    // Masked values never land in the sender slot while receiver is empty.
    assert_ne!(record.get(Field::SenderAccount), Some("4******72"));
}

#[test]
fn test_extraction_is_deterministic() {
    let lib = PatternLibrary::builtin().unwrap();
    let (url, id) = boa_context("https://cs.bankofabyssinia.com/slip/?trx=FT1");
    let profile = lib.resolve(&url);
    let ctx = ExtractionContext {
        url: url.as_str(),
        identifier: id.as_deref(),
    };
    let first = extract(BOA_SLIP, &profile, &ctx);
    for _ in 0..5 {
        assert_eq!(extract(BOA_SLIP, &profile, &ctx), first);
    }
}

#[test]
fn test_first_match_wins() {
    let lib = PatternLibrary::from_json(
        r#"{"fallback":{"name":"t","fields":{"amount":[
            {"pattern":"Total[:\\s]+([\\d,.]+)","validate":"decimal"},
            {"pattern":"Amount[:\\s]+([\\d,.]+)","validate":"decimal"}]}}}"#,
    )
    .unwrap();
    let profile = lib.fallback();
    let ctx = ExtractionContext::default();

    let both = extract("Amount: 5.00 Total: 7.00", profile, &ctx);
    assert_eq!(both.get(Field::Amount), Some("7.00"));

    let second_only = extract("Amount: 5.00", profile, &ctx);
    assert_eq!(second_only.get(Field::Amount), Some("5.00"));
}

#[test]
fn test_cbe_receipt() {
    let lib = PatternLibrary::builtin().unwrap();
    let url = Url::parse("https://apps.cbe.com.et:100/?id=FT25185N7TLH").unwrap();
    let profile = lib.resolve(&url);
    assert_eq!(profile.name(), "cbe");
    let id = slipscan::transaction_identifier(&url, profile.identifier_params());

    let markup = r#"<table>
        <tr><td>Payer</td><td>Debit Account: 1000123456789</td></tr>
        <tr><td>Beneficiary Name: MEKDES ALEMU</td></tr>
        <tr><td>Credit Account: 1000987654321</td></tr>
        <tr><td>Transferred Amount</td><td>1,500.00 ETB</td></tr>
        <tr><td>Payment Date: 04/07/2025 09:30:12</td></tr>
    </table>"#;
    let record = extract(
        markup,
        &profile,
        &ExtractionContext {
            url: url.as_str(),
            identifier: id.as_deref(),
        },
    );
    assert_eq!(record.get(Field::Amount), Some("1500.00"));
    assert_eq!(record.get(Field::Currency), Some("ETB"));
    assert_eq!(record.get(Field::SenderAccount), Some("1000123456789"));
    assert_eq!(record.get(Field::ReceiverAccount), Some("1000987654321"));
    assert_eq!(record.get(Field::ReceiverName), Some("MEKDES ALEMU"));
    assert_eq!(record.get(Field::TransactionId), Some("FT25185N7TLH"));
    assert_eq!(record.get(Field::TransactionType), Some("Fund Transfer"));
}

#[test]
fn test_generic_product_page_with_table() {
    let lib = PatternLibrary::builtin().unwrap();
    let url = Url::parse("https://shop.example.com/item/42").unwrap();
    let profile = lib.resolve(&url);
    let markup = r#"<html><head><meta property="og:title" content="Trail Runner 3"></head>
        <body>
          <span itemprop="price" content="89.95">$89.95</span>
          <meta itemprop="priceCurrency" content="usd">
          <span itemprop="ratingValue">4.6</span>
          <link itemprop="availability" href="https://schema.org/InStock">
          <table>
            <tr><th>Size</th><th>Price</th></tr>
            <tr><td>42</td><td>$89.95</td></tr>
            <tr><td>44</td><td>$94.95</td></tr>
          </table>
        </body></html>"#;

    let out = extract_all(markup, &profile, &ExtractionContext::default());
    assert_eq!(out.record.get(Field::Title), Some("Trail Runner 3"));
    assert_eq!(out.record.get(Field::Price), Some("89.95"));
    assert_eq!(out.record.get(Field::Currency), Some("USD"));
    assert_eq!(out.record.get(Field::Rating), Some("4.6"));
    assert_eq!(out.record.get(Field::Availability), Some("InStock"));
    assert_eq!(out.table_rows.len(), 2);
    assert_eq!(out.table_rows[1].get(Field::Price), Some("94.95"));
    assert_eq!(out.table_rows[1].get_key("size"), Some("44"));
}

#[test]
fn test_unrendered_page_normalizes_to_no_content() {
    let lib = PatternLibrary::builtin().unwrap();
    let url = Url::parse("https://cs.bankofabyssinia.com/slip/?trx=FT1").unwrap();
    let profile = lib.resolve(&url);
    let shell = r#"<html><body><div id="root"></div><script src="/main.js"></script></body></html>"#;
    let out = extract_all(shell, &profile, &ExtractionContext::default());
    let env = normalize(out.into_records(), url.as_str(), Method::Rendered, None);
    assert!(!env.success());
    assert_eq!(env.error().unwrap().kind, ErrorKind::NoContentExtracted);
    assert_eq!(env.records().len(), 1);
    assert!(env.records()[0].is_empty());
}

#[test]
fn test_boa_single_account_fills_one_side() {
    let lib = PatternLibrary::builtin().unwrap();
    let boa = lib.get("boa").unwrap();
    let markup = "<p>Source Account: 1******11</p><p>Transferred amount: ETB 50.00</p>";

    let record = extract(markup, &boa, &ExtractionContext::default());
    assert_eq!(record.get(Field::ReceiverAccount), Some("1******11"));
    assert_eq!(record.get(Field::SenderAccount), None);
}

#[test]
fn test_cbe_single_account_fills_one_side() {
    let lib = PatternLibrary::builtin().unwrap();
    let cbe = lib.get("cbe").unwrap();
    let markup = "<p>Credit Account: 1000987654321</p><p>Amount: 1,500.00</p>";

    let record = extract(markup, &cbe, &ExtractionContext::default());
    assert_eq!(record.get(Field::ReceiverAccount), Some("1000987654321"));
    assert_eq!(record.get(Field::SenderAccount), None);
}

#[test]
fn test_ambiguous_accounts_are_noted_on_the_envelope() {
    let lib = PatternLibrary::builtin().unwrap();
    let boa = lib.get("boa").unwrap();
    let url = "https://cs.bankofabyssinia.com/slip/?trx=FT1";
    let markup = "<p>Account: 1******11</p><p>Account: 4******72</p><p>Transferred amount: ETB 50.00</p>";

    let out = extract_all(markup, &boa, &ExtractionContext::default());
    assert!(!out.record.contains(Field::ReceiverAccount));
    let env = normalize_extraction(out, url, Method::Rendered);
    assert!(env.success());
    assert!(env.note().is_some_and(|n| n.contains("receiverAccount left unresolved")));
}
