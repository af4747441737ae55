use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
};

use crate::track::BoundingBox;

pub const FAILURE_TEXT: &str = "Tracking failed!";

/// BGR triple to an OpenCV colour.
pub fn color(bgr: [u8; 3]) -> Scalar {
    Scalar::new(bgr[0] as f64, bgr[1] as f64, bgr[2] as f64, 0.0)
}

/// Draw text with a black outline so it stays readable on any background.
pub fn draw_text(
    frame: &mut Mat,
    text: &str,
    org: Point,
    font_scale: f64,
    color: Scalar,
    thickness: i32,
) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        text,
        org,
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        thickness + 2,
        imgproc::LINE_8,
        false,
    )?;
    imgproc::put_text(
        frame,
        text,
        org,
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        color,
        thickness,
        imgproc::LINE_8,
        false,
    )
}

/// Rectangle around the tracked target.
pub fn draw_target(frame: &mut Mat, bbox: BoundingBox, color: Scalar) -> opencv::Result<()> {
    imgproc::rectangle(frame, bbox.to_rect(), color, 2, imgproc::LINE_8, 0)
}

/// Overlay shown instead of the rectangle when the target is lost.
pub fn draw_failure(frame: &mut Mat, color: Scalar) -> opencv::Result<()> {
    draw_text(frame, FAILURE_TEXT, Point::new(50, 80), 0.75, color, 2)
}

pub fn draw_frame_info(frame: &mut Mat, frame_id: u64, fps: f64) -> opencv::Result<()> {
    let text = format!("Frame: {} FPS: {:.1}", frame_id, fps);
    draw_text(
        frame,
        &text,
        Point::new(10, 30),
        0.6,
        Scalar::new(255.0, 255.0, 255.0, 0.0),
        1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Rect, Size, Vec3b, CV_8UC3};
    use opencv::prelude::*;

    fn blank() -> Mat {
        Mat::new_size_with_default(Size::new(320, 240), CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn painted(frame: &Mat, roi: Rect) -> f64 {
        let region = Mat::roi(frame, roi).unwrap().try_clone().unwrap();
        let sum = core::sum_elems(&region).unwrap();
        sum[0] + sum[1] + sum[2]
    }

    #[test]
    fn test_draw_target_outlines_box() {
        let mut frame = blank();
        let bbox = BoundingBox::new(100, 60, 50, 40);
        draw_target(&mut frame, bbox, color([255, 0, 0])).unwrap();

        let corner = *frame.at_2d::<Vec3b>(60, 100).unwrap();
        assert_eq!(corner, Vec3b::from([255, 0, 0]));
        // Interior stays untouched.
        let centre = *frame.at_2d::<Vec3b>(80, 125).unwrap();
        assert_eq!(centre, Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_draw_failure_paints_text_area() {
        let mut frame = blank();
        draw_failure(&mut frame, color([0, 0, 255])).unwrap();
        assert!(painted(&frame, Rect::new(40, 55, 220, 35)) > 0.0);
        // Nothing near the bottom of the frame.
        assert_eq!(painted(&frame, Rect::new(0, 200, 320, 40)), 0.0);
    }

    #[test]
    fn test_draw_frame_info() {
        let mut frame = blank();
        draw_frame_info(&mut frame, 12, 29.7).unwrap();
        assert!(painted(&frame, Rect::new(0, 10, 240, 30)) > 0.0);
    }
}
