use uuid::Uuid;

use crate::io::store::NoteWidthStore;

/// A fresh note identifier that no record in `store` uses yet.
pub fn generate_unique_id(store: &dyn NoteWidthStore) -> String {
    unique_id_with(store, || Uuid::new_v4().to_string())
}

/// Draw identifiers from `generate` until one is unused.
pub fn unique_id_with(store: &dyn NoteWidthStore, mut generate: impl FnMut() -> String) -> String {
    loop {
        let id = generate();
        if !store.exists(&id) {
            return id;
        }
    }
}
