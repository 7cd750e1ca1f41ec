//! Dynamic rendering attachment setup.
//!
//! [`RenderingBundle`] owns the attachment infos for one
//! `vkCmdBeginRendering` call so the borrowed [`vk::RenderingInfo`] can be
//! built on demand. Attachments either clear on load or keep their previous
//! contents; all are stored.

use ash::vk;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadAction {
    Clear,
    Load,
}

/// Colour attachment in COLOR_ATTACHMENT_OPTIMAL.
pub fn color_attachment(
    view: vk::ImageView,
    load: LoadAction,
    clear_color: [f32; 4],
) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .load_op(load_op(load))
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        })
}

/// Depth attachment in DEPTH_ATTACHMENT_OPTIMAL; clears to 1.0.
pub fn depth_attachment(view: vk::ImageView, load: LoadAction) -> vk::RenderingAttachmentInfo<'static> {
    vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
        .load_op(load_op(load))
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        })
}

fn load_op(load: LoadAction) -> vk::AttachmentLoadOp {
    match load {
        LoadAction::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadAction::Load => vk::AttachmentLoadOp::LOAD,
    }
}

pub struct RenderingBundle {
    extent: vk::Extent2D,
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attachment: Option<vk::RenderingAttachmentInfo<'static>>,
}

impl RenderingBundle {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    /// Appends a colour target; location follows insertion order.
    pub fn with_color(mut self, attachment: vk::RenderingAttachmentInfo<'static>) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn with_depth(mut self, attachment: vk::RenderingAttachmentInfo<'static>) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn color_count(&self) -> usize {
        self.color_attachments.len()
    }

    pub fn has_depth(&self) -> bool {
        self.depth_attachment.is_some()
    }

    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.extent,
            })
            .layer_count(1)
            .color_attachments(&self.color_attachments);
        if let Some(depth) = self.depth_attachment.as_ref() {
            info = info.depth_attachment(depth);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_load_ops() {
        let clear = color_attachment(vk::ImageView::null(), LoadAction::Clear, [0.0; 4]);
        assert_eq!(clear.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(clear.store_op, vk::AttachmentStoreOp::STORE);

        let load = depth_attachment(vk::ImageView::null(), LoadAction::Load);
        assert_eq!(load.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(load.image_layout, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_bundle_collects_mrt_targets() {
        let extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let bundle = (0..3)
            .fold(RenderingBundle::new(extent), |bundle, _| {
                bundle.with_color(color_attachment(
                    vk::ImageView::null(),
                    LoadAction::Clear,
                    [0.0; 4],
                ))
            })
            .with_depth(depth_attachment(vk::ImageView::null(), LoadAction::Clear));

        assert_eq!(bundle.color_count(), 3);
        assert!(bundle.has_depth());

        let info = bundle.info();
        assert_eq!(info.color_attachment_count, 3);
        assert_eq!(info.render_area.extent.width, 640);
        assert!(!info.p_depth_attachment.is_null());
    }
}
