use hevc_bus::{
    image::{PixelLayout, RawImage},
    pipeline::Pipeline,
    session::Settings,
    task::{EnvelopeCmd, PublisherTask},
};

/// Synthesizes a moving RGB gradient so the demo needs no capture device.
fn test_image(width: u32, height: u32, index: u32) -> RawImage {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x + index * 4) % 256) as u8);
            data.push(((y + index * 2) % 256) as u8);
            data.push((index * 8 % 256) as u8);
        }
    }
    RawImage::packed(width, height, PixelLayout::Rgb24, data)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    hevc_bus::init()?;

    let task = PublisherTask::new();
    let mut envelopes = task.subscribe();

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    task.start(Pipeline::new(Settings::default()), rx).await;

    tokio::spawn(async move {
        for i in 0..60u32 {
            if tx.send(test_image(320, 240, i)).await.is_err() {
                break;
            }
        }
    });

    let mut count = 0usize;
    while let Ok(cmd) = envelopes.recv().await {
        match cmd {
            EnvelopeCmd::Data(envelope) => {
                count += 1;
                println!("envelope {}: {} bytes", count, envelope.len());
            }
            EnvelopeCmd::Eof => break,
        }
    }
    println!("{} envelopes published", count);
    Ok(())
}
