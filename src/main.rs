use std::sync::Arc;

use image::GenericImageView;

use apod::request::HttpTransport;
use apod::state::PictureOfTheDay;

async fn run() -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::new());
    let picture_of_the_day = PictureOfTheDay::new(transport);
    let mut pictures = picture_of_the_day.subscribe_picture();
    let mut images = picture_of_the_day.subscribe_image();
    picture_of_the_day.load();

    pictures.changed().await?;
    {
        let picture = pictures.borrow();
        match &*picture {
            Ok(picture) => {
                println!("Date:        {}", picture.date);
                println!("Title:       {}", picture.title);
                if let Some(copyright) = &picture.copyright {
                    println!("Copyright:   {}", copyright);
                }
                println!("URL:         {}", picture.url);
                println!("Description: {}", picture.explanation);
            }
            Err(err) => eprintln!("Error: {}", err),
        }
    }

    images.changed().await?;
    match &*images.borrow() {
        Ok(Some(image)) => println!("Image:       {}x{} pixels", image.width(), image.height()),
        Ok(None) => println!("No image for this date's media"),
        Err(err) => eprintln!("Image error: {}", err),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    better_panic::install();
    apod::dotenv().ok();
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("{:?}", err);
    }
}
