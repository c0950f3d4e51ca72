#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_messages::{
    from_json, to_json, CatchupRequest, CatchupResponse, HashTreeRequest, HashTreeResponse,
};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = from_json::<CatchupRequest>(text);
    let _ = from_json::<HashTreeRequest>(text);

    // Whatever decodes must encode again and decode to the same shape.
    if let Ok(response) = from_json::<CatchupResponse>(text) {
        let again = to_json(&response).expect("decoded response re-encodes");
        let back: CatchupResponse = from_json(&again).expect("re-encoded response decodes");
        assert_eq!(back.is_current(), response.is_current());
    }
    if let Ok(tree) = from_json::<HashTreeResponse>(text) {
        let again = to_json(&tree).expect("decoded tree re-encodes");
        let back: HashTreeResponse = from_json(&again).expect("re-encoded tree decodes");
        assert_eq!(back.balls.len(), tree.balls.len());
    }
});
