#![no_main]

use cxml_invoice::core::{Table, bundle_from_snapshot};
use cxml_invoice::cxml::{Assembler, DocumentDefaults, StaticSignature, serialize};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(flat) = Table::from_json_records(&json) else {
        return;
    };
    let Ok(bundle) = bundle_from_snapshot(&flat) else {
        return;
    };
    let Ok(ids) = bundle.invoice_ids() else {
        return;
    };
    let defaults = DocumentDefaults::default();
    let signer = StaticSignature::default();
    let assembler = Assembler::new(&defaults, &signer);
    for id in ids {
        if let Ok(doc) = assembler.assemble(&id, &bundle.scoped(&id)) {
            let _ = serialize(&doc);
        }
    }
});
