mod build;
mod interaction;
mod view;

pub(in crate::app) use interaction::BUTTON_ZOOM_STEP;
pub(in crate::app) use view::SearchMatchCache;
