use std::cell::RefCell;
use std::rc::Weak;

use viewer::{LoadTicket, TextureLoadError, TextureLoader};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::WebViewer;

/// Fetches and decodes images with the browser's own decoder, then hands
/// the bitmap to the viewer that asked.
pub struct ImageLoader {
    viewer: Weak<RefCell<WebViewer>>,
}

impl ImageLoader {
    pub fn new(viewer: Weak<RefCell<WebViewer>>) -> Self {
        Self { viewer }
    }
}

impl TextureLoader for ImageLoader {
    fn load(&mut self, ticket: LoadTicket, locator: &str) {
        let viewer = self.viewer.clone();
        let url = locator.to_string();
        wasm_bindgen_futures::spawn_local(async move {
            let result = decode_image(&url).await;
            if ticket.is_cancelled() {
                tracing::debug!(session = %ticket.session, %url, "image arrived after dispose");
                return;
            }
            if let Some(viewer) = viewer.upgrade() {
                viewer.borrow_mut().deliver_texture(&ticket, result);
            }
        });
    }
}

fn js_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

async fn decode_image(url: &str) -> Result<web_sys::ImageBitmap, TextureLoadError> {
    let window = web_sys::window().ok_or_else(|| TextureLoadError::Unsupported("no window".to_string()))?;
    let image = web_sys::HtmlImageElement::new().map_err(|e| TextureLoadError::Unsupported(js_message(&e)))?;
    image.set_cross_origin(Some("anonymous"));
    image.set_src(url);
    JsFuture::from(image.decode())
        .await
        .map_err(|e| TextureLoadError::Network(format!("{url}: {}", js_message(&e))))?;

    let promise = window
        .create_image_bitmap_with_html_image_element(&image)
        .map_err(|e| TextureLoadError::Decode(js_message(&e)))?;
    JsFuture::from(promise)
        .await
        .map_err(|e| TextureLoadError::Decode(js_message(&e)))?
        .dyn_into::<web_sys::ImageBitmap>()
        .map_err(|_| TextureLoadError::Decode("createImageBitmap returned a non-bitmap".to_string()))
}
