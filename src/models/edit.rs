use serde_json::{json, Map, Value};

/// A backend model tried by the edit flow, with the tweaks its payload needs.
#[derive(Clone, Copy)]
pub struct EditVariant {
    pub model_name: &'static str,
    pub customize: fn(&mut Map<String, Value>),
}

/// Tried in order until one answers with HTTP 200.
pub const EDIT_VARIANTS: &[EditVariant] = &[
    EditVariant {
        model_name: "imagine-image-edit",
        customize: no_extras,
    },
    EditVariant {
        model_name: "grok-3",
        customize: fast_mode,
    },
];

fn no_extras(_payload: &mut Map<String, Value>) {}

fn fast_mode(payload: &mut Map<String, Value>) {
    payload.insert("modelMode".to_string(), json!("MODEL_MODE_FAST"));
}

#[derive(Debug, Clone)]
pub struct EditCandidate {
    pub model_name: String,
    pub payload: Value,
}

impl EditVariant {
    pub fn build(&self, prompt: &str, image_urls: &[String]) -> EditCandidate {
        let mut payload = base_edit_payload(prompt, image_urls, self.model_name);
        (self.customize)(&mut payload);
        EditCandidate {
            model_name: self.model_name.to_string(),
            payload: Value::Object(payload),
        }
    }
}

pub fn build_edit_candidates(prompt: &str, image_urls: &[String]) -> Vec<EditCandidate> {
    EDIT_VARIANTS
        .iter()
        .map(|variant| variant.build(prompt, image_urls))
        .collect()
}

fn base_edit_payload(prompt: &str, image_urls: &[String], model_name: &str) -> Map<String, Value> {
    let payload = json!({
        "temporary": true,
        "modelName": model_name,
        "message": prompt,
        "fileAttachments": [],
        "imageAttachments": [],
        "disableSearch": false,
        "enableImageGeneration": true,
        "returnImageBytes": false,
        "returnRawGrokInXaiRequest": false,
        "enableImageStreaming": true,
        "imageGenerationCount": 2,
        "forceConcise": false,
        "toolOverrides": { "imageGen": true },
        "enableSideBySide": true,
        "sendFinalMetadata": true,
        "isReasoning": false,
        "disableTextFollowUps": false,
        "disableMemory": false,
        "forceSideBySide": false,
        "isAsyncChat": false,
        "responseMetadata": {
            "modelConfigOverride": {
                "modelMap": {
                    "imageEditModel": "imagine",
                    "imageEditModelConfig": {
                        "imageReferences": image_urls
                    }
                }
            },
            "requestModelDetails": {
                "modelId": model_name
            }
        }
    });

    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
