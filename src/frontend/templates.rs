use std::path::Path;

/// The two HTML pages the Front-end serves, loaded once at startup from
/// `HTML_PAGES_PATH` and held in memory for the life of the process, since
/// the pages are static for the process lifetime and re-reading them from
/// disk on every request would be pure overhead.
#[derive(Clone)]
pub struct Templates {
    start_page: String,
    order_request: String,
}

impl Templates {
    pub fn load(html_pages_path: &Path) -> std::io::Result<Self> {
        let start_page = std::fs::read_to_string(html_pages_path.join("start_page.html"))?;
        let order_request =
            std::fs::read_to_string(html_pages_path.join("order_request.html"))?;
        Ok(Self {
            start_page,
            order_request,
        })
    }

    /// Renders the landing page, substituting `ADDRESS`/`PORT`.
    pub fn render_start(&self, address: &str, port: u16) -> String {
        self.start_page
            .replace("ADDRESS", address)
            .replace("PORT", &port.to_string())
    }

    /// Renders the order-request page, substituting
    /// `ADDRESS`/`PORT`/`ORDERID`/`PIN_CODE`.
    pub fn render_order(
        &self,
        address: &str,
        port: u16,
        order_id: u64,
        pincode: &str,
    ) -> String {
        self.order_request
            .replace("ADDRESS", address)
            .replace("PORT", &port.to_string())
            .replace("ORDERID", &order_id.to_string())
            .replace("PIN_CODE", pincode)
    }
}
