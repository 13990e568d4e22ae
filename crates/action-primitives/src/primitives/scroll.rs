//! Scroll mechanics.

use std::time::Duration;

use page_port::{PageDriver, ScrollPosition};

use crate::errors::ActionError;
use crate::types::{ScrollKind, ScrollReport, SCROLL_SETTLE_MS};

pub async fn scroll(driver: &dyn PageDriver, kind: ScrollKind) -> Result<ScrollReport, ActionError> {
    match kind {
        ScrollKind::Top => {
            driver.scroll_to(ScrollPosition::Top).await?;
            Ok(ScrollReport { visible: None })
        }
        ScrollKind::Bottom => {
            driver.scroll_to(ScrollPosition::Bottom).await?;
            Ok(ScrollReport { visible: None })
        }
        ScrollKind::By(amount) => {
            driver.scroll_by(0.0, amount).await?;
            Ok(ScrollReport { visible: None })
        }
        ScrollKind::ToNode(node) => {
            driver.scroll_into_view(node).await?;
            tokio::time::sleep(Duration::from_millis(SCROLL_SETTLE_MS)).await;
            let info = driver.node_info(node).await?;
            let viewport = driver.page_state().await?.viewport;
            Ok(ScrollReport {
                visible: Some(info.bbox.intersects(&viewport)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::sim::{NodeDescription, PageDescription, SimPage};

    #[tokio::test(start_paused = true)]
    async fn scroll_to_element_reports_visibility() {
        let page = SimPage::new(
            PageDescription::new("https://sc.test/").node(
                NodeDescription::new("button")
                    .id("deep")
                    .text("Deep")
                    .bbox(10.0, 3000.0, 100.0, 30.0),
            ),
        );
        let node = page.node_by_dom_id("deep").unwrap();
        let report = scroll(&page, ScrollKind::ToNode(node)).await.unwrap();
        assert_eq!(report.visible, Some(true));
    }

    #[tokio::test]
    async fn scroll_by_moves_and_clamps() {
        let page = SimPage::new(
            PageDescription::new("https://sc.test/").node(
                NodeDescription::new("p").text("tall").bbox(0.0, 0.0, 100.0, 2000.0),
            ),
        );
        scroll(&page, ScrollKind::By(600.0)).await.unwrap();
        assert_eq!(page.page_state().await.unwrap().scroll.y, 600.0);
        scroll(&page, ScrollKind::Bottom).await.unwrap();
        let max = page.page_state().await.unwrap().scroll.y;
        scroll(&page, ScrollKind::By(10_000.0)).await.unwrap();
        assert_eq!(page.page_state().await.unwrap().scroll.y, max);
        scroll(&page, ScrollKind::Top).await.unwrap();
        assert_eq!(page.page_state().await.unwrap().scroll.y, 0.0);
    }
}
